//! lexicloud - keyword word clouds from Word, PDF and OFD documents.
//!
//! # Usage
//!
//! ```bash
//! # TF-IDF keywords over ./docs
//! lexicloud --method tfidf --docs-dir ./docs
//!
//! # LLM keywords through a local Ollama service, shaped by a mask
//! lexicloud --method llm --api-type ollama --mask mask.png
//!
//! # Write the effective configuration to a file
//! lexicloud --write-config lexicloud.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lexicloud_cli::output::{self, Status};
use lexicloud_cli::Pipeline;
use lexicloud_core::config::LexiConfig;
use lexicloud_core::types::{ApiType, ExtractionMethod};
use std::path::{Path, PathBuf};
use std::process;
use tracing_appender::non_blocking::WorkerGuard;

const DEFAULT_CONFIG_FILE: &str = "lexicloud.toml";

#[derive(Parser)]
#[command(name = "lexicloud")]
#[command(about = "Keyword word clouds from Word, PDF and OFD documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Keyword extraction method
    #[arg(short, long, default_value = "llm")]
    method: MethodArg,

    /// Directory containing the documents
    #[arg(short, long, default_value = "docs")]
    docs_dir: PathBuf,

    /// Mask image shaping the word cloud
    #[arg(long)]
    mask: Option<PathBuf>,

    /// LLM service used by the llm method
    #[arg(long)]
    api_type: Option<ApiTypeArg>,

    /// Configuration file path (default: ./lexicloud.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the image and the keyword report
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Font used to draw the words
    #[arg(long)]
    font: Option<PathBuf>,

    /// Maximum keywords per document
    #[arg(short, long)]
    limit: Option<usize>,

    /// Enable verbose logging and print per-document keywords
    #[arg(short, long)]
    verbose: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodArg {
    Llm,
    Tfidf,
}

impl From<MethodArg> for ExtractionMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Llm => ExtractionMethod::Llm,
            MethodArg::Tfidf => ExtractionMethod::Tfidf,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ApiTypeArg {
    Deepseek,
    Ollama,
}

impl From<ApiTypeArg> for ApiType {
    fn from(arg: ApiTypeArg) -> Self {
        match arg {
            ApiTypeArg::Deepseek => ApiType::DeepSeek,
            ApiTypeArg::Ollama => ApiType::Ollama,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::announce(Status::Failed, format!("{:#}", e));
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli).await?;

    if let Some(path) = &cli.write_config {
        config
            .save_to_path(path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        output::announce(Status::Done, format!("Configuration written to {}", path.display()));
        return Ok(());
    }

    let _guard = init_logging(&config, cli.verbose)?;

    let method = ExtractionMethod::from(cli.method);
    output::announce(
        Status::Note,
        format!(
            "Extracting keywords from {} with {}",
            cli.docs_dir.display(),
            method
        ),
    );

    let pipeline = Pipeline::new(config, method).with_progress(output::progress_bar());
    let report = pipeline
        .run(&cli.docs_dir)
        .await
        .context("Keyword extraction failed")?;

    output::print_summary(&report, cli.verbose);

    match report.into_error() {
        Some(e) => Err(e).context("Not every artifact was written"),
        None => Ok(()),
    }
}

/// Defaults, then the config file, then environment, then command-line flags
async fn load_config(cli: &Cli) -> Result<LexiConfig> {
    let mut config = match &cli.config {
        Some(path) => LexiConfig::load_from_path(path).await?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            LexiConfig::load_from_path(Path::new(DEFAULT_CONFIG_FILE)).await?
        }
        None => LexiConfig::from_env(),
    };

    if let Some(api_type) = cli.api_type {
        config.llm.api_type = api_type.into();
    }
    if let Some(mask) = &cli.mask {
        config.wordcloud.mask_path = Some(mask.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(font) = &cli.font {
        config.wordcloud.font_path = font.clone();
    }
    if let Some(limit) = cli.limit {
        config.keywords.per_document_limit = limit;
    }
    if cli.verbose {
        config.general.log_level = "debug".to_string();
    }

    config.validate()?;
    Ok(config)
}

/// Initialize logging: stderr, plus the configured log file when set
const LOG_TARGETS: [&str; 6] = [
    "lexicloud",
    "lexicloud_core",
    "lexicloud_ingestion",
    "lexicloud_keywords",
    "lexicloud_render",
    "lexicloud_cli",
];

/// `level` for every workspace crate, `fallback` for dependencies
fn log_directives(level: &str, fallback: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push(fallback.to_string());
    directives.join(",")
}

fn init_logging(config: &LexiConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new(log_directives("debug", "info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_directives(&config.general.log_level, "warn")))
    };

    let (file_layer, guard) = match &config.general.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_directives_cover_library_crates() {
        let directives = log_directives("debug", "info");
        for target in ["lexicloud_ingestion", "lexicloud_keywords", "lexicloud_render", "lexicloud_core"] {
            assert!(directives.contains(&format!("{}=debug", target)), "{}", directives);
        }
        assert!(directives.ends_with(",info"));
        tracing_subscriber::EnvFilter::try_new(&directives).unwrap();
    }
}
