//! Stop-word and excluded-keyword lists.
//!
//! Lists are plain UTF-8 files with one entry per line. Blank lines and lines
//! starting with `#` are ignored. A list that cannot be read is logged and
//! treated as empty.

use lexicloud_core::config::DocumentsConfig;
use lexicloud_core::term::normalize_term;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parse the contents of a word list file
pub fn parse_word_list(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(normalize_term)
        .filter(|word| !word.is_empty())
        .collect()
}

/// Read one word list file; unreadable files yield an empty set
pub async fn load_word_list(path: &Path) -> HashSet<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let words = parse_word_list(&content);
            debug!("Loaded {} words from {}", words.len(), path.display());
            words
        }
        Err(e) => {
            warn!("Failed to load word list from {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}

/// Every `*.txt` file directly inside `dir`, sorted by name
async fn list_txt_files(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read stop-word directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_txt = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
                if is_txt && path.is_file() {
                    files.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error while listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    if files.is_empty() {
        warn!("No txt files found in {}", dir.display());
    }
    files.sort();
    files
}

/// Union of all configured stop-word files and the stop-word directory
pub async fn load_stopwords(config: &DocumentsConfig) -> HashSet<String> {
    let mut stopwords = HashSet::new();

    for path in &config.stopword_files {
        stopwords.extend(load_word_list(path).await);
    }

    if let Some(dir) = &config.stopword_dir {
        let files = list_txt_files(dir).await;
        for path in &files {
            stopwords.extend(load_word_list(path).await);
        }
        debug!("Read {} stop-word files from {}", files.len(), dir.display());
    }

    info!("Loaded {} stop words", stopwords.len());
    stopwords
}

/// Keywords that must never be reported
pub async fn load_excluded_keywords(config: &DocumentsConfig) -> HashSet<String> {
    let excluded = match &config.exclude_keywords_file {
        Some(path) => load_word_list(path).await,
        None => HashSet::new(),
    };
    info!("Loaded {} excluded keywords", excluded.len());
    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let words = parse_word_list("# 常用停用词\n的\n\n了\n  和  \n#注释\nThe\n");
        let expected: HashSet<String> = ["的", "了", "和", "the"].iter().map(|s| s.to_string()).collect();
        assert_eq!(words, expected);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let words = load_word_list(&dir.path().join("absent.txt")).await;
        assert!(words.is_empty());
    }

    #[tokio::test]
    async fn test_load_stopwords_merges_files_and_directory() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("stopwords.txt");
        tokio::fs::write(&main, "的\n了\n").await.unwrap();

        let extra = dir.path().join("extra");
        tokio::fs::create_dir(&extra).await.unwrap();
        tokio::fs::write(extra.join("a.txt"), "我们\n").await.unwrap();
        tokio::fs::write(extra.join("b.txt"), "他们\n的\n").await.unwrap();
        tokio::fs::write(extra.join("ignored.md"), "不应\n").await.unwrap();

        let config = DocumentsConfig {
            stopword_files: vec![main, dir.path().join("missing.txt")],
            stopword_dir: Some(extra),
            ..DocumentsConfig::default()
        };

        let words = load_stopwords(&config).await;
        assert_eq!(words.len(), 4);
        assert!(words.contains("我们"));
        assert!(!words.contains("不应"));
    }

    #[tokio::test]
    async fn test_excluded_keywords_optional() {
        let config = DocumentsConfig {
            exclude_keywords_file: None,
            ..DocumentsConfig::default()
        };
        assert!(load_excluded_keywords(&config).await.is_empty());
    }
}
