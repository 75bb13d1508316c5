//! Error taxonomy and retry helper.
//!
//! Errors are tagged by kind rather than carrying ad-hoc strings, so callers
//! can decide retry/surface/fatal handling programmatically. `SearchError`
//! and `McpError` in the other crates wrap `IndexError` via `#[from]`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Optional structured context attached to an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file: Option<String>,
    pub field: Option<String>,
    pub provider: Option<String>,
    pub url: Option<String>,
    pub retry_after_ms: Option<u64>,
}

impl ErrorContext {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Default::default()
        }
    }

    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref file) = self.file {
            parts.push(format!("file={file}"));
        }
        if let Some(ref field) = self.field {
            parts.push(format!("field={field}"));
        }
        if let Some(ref provider) = self.provider {
            parts.push(format!("provider={provider}"));
        }
        if let Some(ref url) = self.url {
            parts.push(format!("url={url}"));
        }
        if let Some(retry_after_ms) = self.retry_after_ms {
            parts.push(format!("retry_after_ms={retry_after_ms}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// The tagged error kind, per the error handling design.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("parsing: {0}")]
    Parsing(String),
    #[error("embedding: {0}")]
    Embedding(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("indexing: {0}")]
    Indexing(String),
    #[error("search: {0}")]
    Search(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("network: {0}")]
    Network(String),
    #[error("filesystem: {0}")]
    FileSystem(String),
    #[error("retryable: {0}")]
    Retryable(String),
}

impl ErrorKind {
    /// Short uppercase code used in the `[CODE] message` surfaced format.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration(_) => "CONFIGURATION",
            ErrorKind::Parsing(_) => "PARSING",
            ErrorKind::Embedding(_) => "EMBEDDING",
            ErrorKind::Storage(_) => "STORAGE",
            ErrorKind::Indexing(_) => "INDEXING",
            ErrorKind::Search(_) => "SEARCH",
            ErrorKind::Validation(_) => "VALIDATION",
            ErrorKind::Network(_) => "NETWORK",
            ErrorKind::FileSystem(_) => "FILESYSTEM",
            ErrorKind::Retryable(_) => "RETRYABLE",
        }
    }

    /// Whether this kind is eligible for automatic retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Retryable(_) | ErrorKind::Network(_))
    }
}

/// The crate-wide error type: a kind plus optional structured context.
#[derive(Error, Debug)]
#[error("{kind}{}", context.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct IndexError {
    pub kind: ErrorKind,
    pub context: Option<ErrorContext>,
}

impl IndexError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context(kind: ErrorKind, context: ErrorContext) -> Self {
        Self {
            kind,
            context: Some(context),
        }
    }

    /// Whether this error is eligible for automatic retry.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// The `[CODE] message` form used for user-visible, surfaced errors.
    pub fn surfaced(&self) -> String {
        format!("[{}] {}", self.kind.code(), self.kind)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::new(ErrorKind::FileSystem(e.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Exponential backoff parameters for the retry helper.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 2,
            cap: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl BackoffConfig {
    /// Delay to use before the attempt numbered `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.initial;
        for _ in 1..attempt {
            delay = std::cmp::min(delay * self.factor, self.cap);
        }
        std::cmp::min(delay, self.cap)
    }
}

/// Retry an async operation with exponential backoff, but only for
/// `Retryable`/`Network` error kinds; any other kind is surfaced immediately.
pub async fn with_backoff<T, F, Fut>(config: BackoffConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio_sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn tokio_sleep(d: Duration) {
    tokio::time::sleep(d).await;
}
