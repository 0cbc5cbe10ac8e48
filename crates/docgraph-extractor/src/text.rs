//! Plain-text extraction from uploaded document bytes

use crate::error::ExtractorError;
use docgraph_domain::FileType;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;

const DOCX_BODY: &str = "word/document.xml";

/// Extract plain text from `bytes` according to the declared type
///
/// `declared_type` is matched case-insensitively, with or without a leading
/// dot. The function has no side effects.
///
/// # Errors
///
/// - [`ExtractorError::UnsupportedFileType`] for anything but pdf, docx, txt, csv
/// - [`ExtractorError::Extraction`] when the bytes cannot be decoded
///
/// # Examples
///
/// ```
/// use docgraph_extractor::extract_text;
///
/// let text = extract_text(b"  Alice met Bob.\n", ".TXT").unwrap();
/// assert_eq!(text, "Alice met Bob.");
/// ```
pub fn extract_text(bytes: &[u8], declared_type: &str) -> Result<String, ExtractorError> {
    let file_type = FileType::parse(declared_type)
        .ok_or_else(|| ExtractorError::UnsupportedFileType(declared_type.to_string()))?;

    let text = match file_type {
        FileType::Pdf => pdf_text(bytes)?,
        FileType::Docx => docx_text(bytes)?,
        FileType::Txt => txt_text(bytes)?,
        FileType::Csv => csv_text(bytes)?,
    };

    debug!(file_type = %file_type, input_bytes = bytes.len(), chars = text.len(), "Extracted text");
    Ok(text)
}

fn pdf_text(bytes: &[u8]) -> Result<String, ExtractorError> {
    // pdf-extract panics on some malformed inputs
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match result {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(ExtractorError::extraction(FileType::Pdf, e)),
        Err(_) => Err(ExtractorError::extraction(
            FileType::Pdf,
            "document structure could not be read",
        )),
    }
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractorError> {
    let err = |e: &dyn std::fmt::Display| ExtractorError::extraction(FileType::Docx, e);

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| err(&e))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| err(&format!("{}: {}", DOCX_BODY, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| err(&e))?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event().map_err(|e| err(&e))? {
            Event::Start(e) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_run = true;
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                out.push_str(&t.unescape().map_err(|e| err(&e))?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim().to_string())
}

fn txt_text(bytes: &[u8]) -> Result<String, ExtractorError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractorError::extraction(FileType::Txt, e))?;
    Ok(text.trim().to_string())
}

fn csv_text(bytes: &[u8]) -> Result<String, ExtractorError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractorError::extraction(FileType::Csv, e))?;
        rows.push(record.iter().collect::<Vec<_>>().join(", "));
    }
    Ok(rows.join("\n"))
}
