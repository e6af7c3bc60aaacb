use thiserror::Error;

/// Terminal failures of a transform. Partial resolution misses are never
/// reported through this type; they land in [`crate::report::Report`].
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no sheet matches the pending detail pattern `{pattern}`")]
    NoPendingSheet { pattern: String },

    #[error("roster sheet '{0}' is missing from the workbook")]
    MissingRoster(String),

    #[error("sheet '{sheet}' has no column named '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to decode workbook: {0}")]
    Decode(String),

    #[error("failed to save workbook: {0}")]
    Save(String),

    #[error("failed to write miss report: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// True for failures caused by the shape of the input workbook or the
    /// configuration rather than by the codec.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoPendingSheet { .. }
                | Self::MissingRoster(_)
                | Self::MissingColumn { .. }
                | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T, E = TransformError> = std::result::Result<T, E>;
