//! services/api/src/adapters/extract.rs
//!
//! Text extraction for uploaded documents, dispatched on the declared MIME type:
//! PDF text is read page by page with `lopdf`, Word documents go through
//! `pandoc`, images through `tesseract`, and anything else is decoded as UTF-8
//! with invalid bytes dropped.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use bizdesk_core::domain::UploadedFile;
use bizdesk_core::ports::{PortError, PortResult, TextExtractor};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const EXTRACTION_CMD_TIMEOUT: Duration = Duration::from_secs(120);

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout: Duration) -> PortResult<String> {
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            PortError::Unexpected(format!(
                "External command timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| PortError::Unexpected(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PortError::Unexpected(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Writes the upload to a temp file that keeps the original extension, so the
/// external tools can sniff the format.
fn write_temp_file(file: &UploadedFile) -> PortResult<tempfile::NamedTempFile> {
    let suffix = file
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();
    let mut tmpfile = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| PortError::Unexpected(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(&file.bytes)
        .map_err(|e| PortError::Unexpected(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Decodes bytes as UTF-8, dropping anything that is not valid.
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Concatenates the text of every page. A page whose text cannot be decoded
/// contributes nothing rather than failing the document.
pub fn pdf_text(bytes: &[u8]) -> PortResult<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| PortError::InvalidInput(format!("Unreadable PDF: {}", e)))?;
    let mut text = String::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => warn!(page = page_number, error = %e, "Skipping PDF page without text"),
        }
    }
    Ok(text)
}

/// Pandoc separates paragraphs with blank lines; the desk keeps one paragraph per line.
fn paragraphs_per_line(plain: &str) -> PortResult<String> {
    let blank_lines =
        Regex::new(r"\n[ \t]*\n+").map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(blank_lines.replace_all(plain.trim_end(), "\n").into_owned())
}

#[derive(Clone, Default)]
pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn docx_text(&self, file: &UploadedFile) -> PortResult<String> {
        let tmpfile = write_temp_file(file)?;
        debug!(filename = %file.filename, "Converting with pandoc");
        let plain = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg("docx")
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(tmpfile.path()),
            EXTRACTION_CMD_TIMEOUT,
        )
        .await?;
        paragraphs_per_line(&plain)
    }

    async fn image_text(&self, file: &UploadedFile) -> PortResult<String> {
        let tmpfile = write_temp_file(file)?;
        debug!(filename = %file.filename, "Running OCR with tesseract");
        run_cmd_with_timeout(
            Command::new("tesseract").arg(tmpfile.path()).arg("stdout"),
            EXTRACTION_CMD_TIMEOUT,
        )
        .await
    }
}

#[async_trait]
impl TextExtractor for DocumentTextExtractor {
    async fn extract(&self, file: &UploadedFile) -> PortResult<String> {
        match file.mime_type.as_str() {
            PDF_MIME => {
                let bytes = file.bytes.clone();
                tokio::task::spawn_blocking(move || pdf_text(&bytes))
                    .await
                    .map_err(|e| PortError::Unexpected(format!("PDF extraction panicked: {}", e)))?
            }
            DOCX_MIME => self.docx_text(file).await,
            mime if mime.starts_with("image") => self.image_text(file).await,
            _ => Ok(decode_lossy(&file.bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode_lossy(b"caf\xc3\xa9 \xff\xfeok"), "café ok");
    }

    #[test]
    fn test_paragraphs_collapse_to_single_lines() {
        let plain = "First paragraph.\n\nSecond paragraph.\n \n\nThird.\n";
        assert_eq!(
            paragraphs_per_line(plain).unwrap(),
            "First paragraph.\nSecond paragraph.\nThird."
        );
    }

    #[test]
    fn test_garbage_pdf_is_invalid_input() {
        assert!(matches!(
            pdf_text(b"definitely not a pdf"),
            Err(PortError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_types_are_decoded_as_text() {
        let file = UploadedFile {
            filename: "notes.md".to_string(),
            mime_type: "text/markdown".to_string(),
            bytes: b"# Heading\nbody".to_vec(),
        };
        let text = DocumentTextExtractor::new().extract(&file).await.unwrap();
        assert_eq!(text, "# Heading\nbody");
    }
}
