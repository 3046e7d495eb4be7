//! lexicloud CLI library: the pipeline behind the `lexicloud` binary.

pub mod output;
pub mod pipeline;

pub use pipeline::{artifact_paths, ArtifactOutcome, Pipeline, RunReport};
