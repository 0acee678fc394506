use thiserror::Error;

/// Failure taxonomy for one pipeline turn.
///
/// Only `Completion` escalates to the top-level boundary: no safe assistant
/// message exists to substitute for an absent generation. Every other
/// variant is recovered where it occurs (deterministic classifier fallback,
/// empty retrieval, unenhanced reply, cache-less turn).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("classification failure: {0}")]
    Classification(String),
    #[error("retrieval failure: {0}")]
    Retrieval(String),
    #[error("completion provider failure: {0}")]
    Completion(String),
    #[error("enhancement failure: {0}")]
    Enhancement(String),
    #[error("context store failure: {0}")]
    ContextStore(String),
}

impl PipelineError {
    /// Whether this failure must reach the fallback boundary instead of
    /// being absorbed locally.
    pub fn escalates(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}
