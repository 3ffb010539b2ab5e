/// Shared error type used across all Shakes crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Local rate-limit bookkeeping denied the attempt before it was sent.
    #[error("{provider} rate limited: {reason} (retry after {retry_after_secs}s)")]
    RateLimited {
        provider: String,
        reason: String,
        retry_after_secs: u64,
    },

    /// Every enabled provider was either denied admission or failed.
    #[error("all AI providers failed or were rate limited. Last error: {last_error}")]
    NoProvider { last_error: String },

    /// A queued request used all permitted retries.
    #[error("max retries exceeded: {0}")]
    RetriesExhausted(String),

    /// The queue was forcibly emptied while this request was pending.
    #[error("queue cleared")]
    QueueCleared,

    /// No JSON could be recovered from the model output.
    #[error("failed to parse JSON from model response: {0}")]
    JsonExtract(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
