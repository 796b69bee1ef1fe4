use thiserror::Error;

/// Failures from an outbound search provider or its poll loop. Every
/// variant carries enough raw provider text for operator diagnosis.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid query for {provider}: {reason}")]
    InvalidQuery { provider: String, reason: String },

    #[error("{provider} rejected our credentials: {detail}")]
    AuthenticationFailure { provider: String, detail: String },

    #[error("{provider} rejected the request: {detail}")]
    ProviderRejected { provider: String, detail: String },

    #[error("network failure talking to {provider}: {detail}")]
    NetworkFailure { provider: String, detail: String },

    #[error("{provider} rate limited us: {detail}")]
    RateLimited { provider: String, detail: String },

    #[error("{provider} job did not finish within {budget_secs}s")]
    Timeout { provider: String, budget_secs: u64 },

    #[error("{provider} job ended as {status}")]
    JobFailed { provider: String, status: String },
}

/// A single raw record that could not be shaped into a Lead. Recovered
/// per-record: the batch continues without it.
#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("malformed record: missing {field}")]
    MalformedRecord { field: &'static str },
}

#[derive(Error, Debug, PartialEq)]
pub enum StagingError {
    #[error("no staged results for this search attempt")]
    NotFound,

    #[error("staged results were already confirmed")]
    AlreadyConsumed,
}
