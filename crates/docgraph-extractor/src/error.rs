//! Error types for the Extractor

use docgraph_domain::FileType;
use thiserror::Error;

/// Errors that can occur while turning a document into a graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Declared type is not one of pdf, docx, txt, csv
    #[error("Unsupported file type '{0}'")]
    UnsupportedFileType(String),

    /// The bytes could not be decoded as the declared type
    #[error("Failed to extract text from {file_type} file: {message}")]
    Extraction {
        /// Declared type of the document
        file_type: FileType,
        /// Underlying cause
        message: String,
    },

    /// LLM backend could not be reached and fallback is disabled
    #[error("LLM backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Final graph violated a structural invariant
    #[error("Invalid graph shape: {0}")]
    InvalidGraphShape(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    pub(crate) fn extraction(file_type: FileType, message: impl std::fmt::Display) -> Self {
        ExtractorError::Extraction {
            file_type,
            message: message.to_string(),
        }
    }
}
