use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Row validation error: {0}")]
    RowValidation(String),

    // field is named source_name: thiserror reserves `source` for the
    // underlying std::error::Error chain
    #[error("Source collection error for {source_name}: {reason}")]
    SourceCollection { source_name: String, reason: String },

    #[error("Merge invariant violation: {0}")]
    MergeInvariant(String),

    #[error("Statistics invariant violation: {0}")]
    StatsInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_collection_display() {
        let err = PipelineError::SourceCollection {
            source_name: "exoplanet_eu".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Source collection error for exoplanet_eu: connection refused"
        );
        // structured variants carry no underlying error
        assert!(std::error::Error::source(&err).is_none());
    }
}
