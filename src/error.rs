use std::path::PathBuf;

pub type PaletteResult<T> = Result<T, PaletteError>;

/// Failures raised by the sampling, extraction, selection and composition stages.
#[derive(thiserror::Error, Debug)]
pub enum PaletteError {
    /// The video (or one of its frames) could not be read or decoded.
    #[error("cannot read source '{}': {reason}", path.display())]
    SourceRead { path: PathBuf, reason: String },

    /// Start/step/end values that do not describe a non-empty time range.
    #[error("invalid time range: {0}")]
    InvalidRange(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("cannot select a color from an empty color set")]
    EmptyColorSet,

    #[error("cannot compose an image from an empty palette")]
    EmptyPalette,

    /// An intermediate artifact is missing, unparsable or fails its checksum.
    #[error("corrupt artifact '{}': {reason}", path.display())]
    Serialization { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PaletteError {
    pub fn source_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = PaletteError::source_read("videos/missing.mp4", "no such file");
        assert_eq!(
            err.to_string(),
            "cannot read source 'videos/missing.mp4': no such file"
        );

        let err = PaletteError::invalid_parameter("clusters", "must be at least 1");
        assert_eq!(err.to_string(), "invalid parameter `clusters`: must be at least 1");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PaletteError = io.into();
        assert!(matches!(err, PaletteError::Io(_)));
    }
}
