use thiserror::Error;

/// Reasons a raw course record is rejected by the normalizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("schema violation: unknown field(s) {}", fields.join(", "))]
    SchemaViolation { fields: Vec<String> },

    #[error("field type error in `{field}`: {reason}")]
    FieldTypeError { field: String, reason: String },
}

impl NormalizeError {
    pub fn field_type(field: impl Into<String>, reason: impl Into<String>) -> Self {
        NormalizeError::FieldTypeError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required markup: {0}")]
    MissingMarkup(String),

    #[error("Normalization failed for {link}: {source}")]
    Normalize {
        link: String,
        #[source]
        source: NormalizeError,
    },

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
