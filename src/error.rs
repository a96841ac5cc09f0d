use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("field mapping has no child field; nothing to build yet")]
    IncompleteMapping,

    #[error("no record with an empty parent link among {records} records")]
    MissingRoot { records: usize },

    #[error("{count} records have an empty parent link; strict root policy allows one")]
    AmbiguousRoot { count: usize },

    #[error("cyclic hierarchy: '{id}' is its own ancestor")]
    CyclicHierarchy { id: String },

    #[error("hierarchy is deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("hierarchy expands past {limit} nodes")]
    TreeTooLarge { limit: usize },

    #[error("color spec contains no color stops")]
    EmptyColorSpec,

    #[error("invalid color stop '{stop}'")]
    InvalidColor { stop: String },

    #[error("failed to fingerprint stage input: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PipelineError {
    /// Errors that mean "the data or mapping is not configured yet". Callers
    /// show a loading state for these instead of failing the render.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::IncompleteMapping | Self::MissingRoot { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_covers_configuration_gaps_only() {
        assert!(PipelineError::IncompleteMapping.is_not_ready());
        assert!(PipelineError::MissingRoot { records: 3 }.is_not_ready());
        assert!(!PipelineError::CyclicHierarchy { id: "a".into() }.is_not_ready());
        assert!(!PipelineError::EmptyColorSpec.is_not_ready());
    }

    #[test]
    fn missing_root_reports_dataset_size() {
        let message = PipelineError::MissingRoot { records: 42 }.to_string();
        assert!(message.contains("42"));
    }
}
