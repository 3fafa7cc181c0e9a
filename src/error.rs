//! Error taxonomy for the rendering pipeline.
//!
//! Only [`RenderError::SecurityViolation`] and [`RenderError::ResourceLimit`]
//! are raised by the pipeline stages themselves; parsing and layout anomalies
//! are recovered locally and reported as warnings on the
//! [`RenderResult`](crate::pipeline::RenderResult).

/// Errors returned by the pipeline and its surrounding surfaces.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Empty, non-UTF-8 or otherwise unusable content.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Markup that could not be recovered into a tree.
    #[error("invalid markup: {0}")]
    InvalidMarkup(String),

    /// Disallowed URL scheme, blocked domain or unsafe content pattern.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// Content size, tree depth, node count, page count, memory or time bound exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// Renderer-internal encoding failure.
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// Unreadable or malformed print options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading input or writing output failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether this error is one of the hard failures of the pipeline
    /// (as opposed to an error from the surrounding I/O or config surface).
    pub fn is_fatal_violation(&self) -> bool {
        matches!(
            self,
            RenderError::SecurityViolation(_) | RenderError::ResourceLimit(_)
        )
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Config(e.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Maximum number of warnings kept per render; pathological input can
/// otherwise produce one warning per token.
pub const MAX_WARNINGS: usize = 200;

/// Bounded collector for recoverable anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings {
    items: Vec<String>,
    suppressed: usize,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.items.len() < MAX_WARNINGS {
            self.items.push(message.into());
        } else {
            self.suppressed += 1;
        }
    }

    pub fn extend<I, S>(&mut self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for m in messages {
            self.push(m);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Final list, with a trailing note when anything was dropped.
    pub fn into_vec(mut self) -> Vec<String> {
        if self.suppressed > 0 {
            self.items
                .push(format!("{} further warnings suppressed", self.suppressed));
        }
        self.items
    }
}
