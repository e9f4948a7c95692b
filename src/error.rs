/// Error type for every fallible engine operation.
#[derive(Debug, thiserror::Error)]
pub enum GachaError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("unknown strategy label: {0}")]
    UnknownStrategy(String),

    #[error("unknown banner: {0}")]
    UnknownBanner(String),

    #[error("banner '{banner}' has no featured item '{target}'")]
    UnknownTarget { banner: String, target: String },

    #[error("'{target}' asks for {copies} copies, banner '{banner}' allows 0..={max}")]
    CopiesOutOfRange {
        banner: String,
        target: String,
        copies: i64,
        max: u32,
    },

    #[error("invalid banner config '{banner}': {reason}")]
    InvalidConfig { banner: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker error: {0}")]
    Worker(String),
}

pub type GachaResult<T> = Result<T, GachaError>;

impl GachaError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        GachaError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Converts a signed request field into a count, rejecting negatives.
pub fn non_negative(field: &'static str, value: i64) -> GachaResult<u32> {
    if value < 0 {
        return Err(GachaError::invalid(field, format!("must be >= 0, got {}", value)));
    }
    u32::try_from(value)
        .map_err(|_| GachaError::invalid(field, format!("{} is too large", value)))
}
