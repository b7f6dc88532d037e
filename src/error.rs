use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Data access error: {0}")]
    DataAccess(String),

    #[error("No transactions found in the history window")]
    EmptyHistory,

    #[error("Model fit failed for series '{series}': {reason}")]
    ModelFit { series: String, reason: String },

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("No JSON object or array found in generator output")]
    Extraction { raw: String },

    #[error("Generator output contained malformed JSON: {source}")]
    JsonParse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForecastError {
    pub(crate) fn model_fit(series: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelFit {
            series: series.into(),
            reason: reason.into(),
        }
    }

    /// The raw generator text attached to extraction failures, for diagnostics.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Extraction { raw } | Self::JsonParse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
