//! Document module - uploaded files and their extracted text

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned document identifier (positive)
pub type DocumentId = i64;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Portable Document Format
    Pdf,

    /// Office Open XML word-processing document
    Docx,

    /// Plain UTF-8 text
    Txt,

    /// Comma-separated values
    Csv,
}

impl FileType {
    /// Every supported type, in display order
    pub const ALL: [FileType; 4] = [FileType::Pdf, FileType::Docx, FileType::Txt, FileType::Csv];

    /// Get the type name as a string (also the file extension, without dot)
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
            FileType::Csv => "csv",
        }
    }

    /// Parse a declared type or extension
    ///
    /// Case-insensitive; a leading dot is accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use docgraph_domain::FileType;
    ///
    /// assert_eq!(FileType::parse(".PDF"), Some(FileType::Pdf));
    /// assert_eq!(FileType::parse("docx"), Some(FileType::Docx));
    /// assert_eq!(FileType::parse("exe"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Txt),
            "csv" => Some(FileType::Csv),
            _ => None,
        }
    }

    /// Determine the type from a filename's extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::parse(ext)
    }

    /// Comma-separated list of supported extensions, for error messages
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|t| format!(".{}", t.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,

    /// Original (sanitized) filename
    pub filename: String,

    /// Declared file type
    pub file_type: FileType,

    /// Where the uploaded bytes were written
    pub file_path: String,

    /// Upload time (seconds since Unix epoch)
    pub upload_date: u64,

    /// Extracted plain text; replaced or appended to on update
    pub text_content: String,
}

/// Fields needed to create a document
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    /// Original (sanitized) filename
    pub filename: String,

    /// Declared file type
    pub file_type: FileType,

    /// Where the uploaded bytes were written
    pub file_path: String,

    /// Extracted plain text
    pub text_content: String,
}
