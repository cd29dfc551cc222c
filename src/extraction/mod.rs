//! Multi-format text extraction for uploaded documents.
//!
//! A [`Document`] carries raw bytes plus the declared MIME type from the upload. Extraction
//! never fails: unsupported types, unreadable PDFs and converter failures all produce an
//! empty string, and the pipeline treats empty text as "nothing to index".

pub mod converter;
pub mod pdf;

use crate::config::Config;
use converter::{CommandConverter, Converter};
use std::path::Path;
use std::sync::Arc;

/// MIME type of PDF uploads.
pub const MIME_PDF: &str = "application/pdf";
/// MIME type of legacy (pre-XML) word-processor uploads.
pub const MIME_MSWORD: &str = "application/msword";
/// MIME type of plain-text uploads.
pub const MIME_TEXT: &str = "text/plain";

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Paged PDF document.
    Pdf,
    /// Legacy binary word-processor file, converted by an external program.
    LegacyWord,
    /// Plain text in UTF-8 or Latin-1.
    PlainText,
}

impl ContentType {
    /// Resolve a declared MIME type, ignoring parameters such as `charset`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_MSWORD => Some(Self::LegacyWord),
            MIME_TEXT => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Guess the type from a file extension (`pdf`, `doc`, `txt`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::LegacyWord),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Canonical MIME type for this format.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => MIME_PDF,
            Self::LegacyWord => MIME_MSWORD,
            Self::PlainText => MIME_TEXT,
        }
    }
}

/// An uploaded document: raw bytes and the declared content type.
#[derive(Debug, Clone)]
pub struct Document {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// MIME type declared by the uploader.
    pub content_type: String,
    /// Optional original file name, used for display only.
    pub file_name: Option<String>,
}

impl Document {
    /// Build a document from bytes and a declared MIME type.
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            file_name: None,
        }
    }

    /// Attach the original file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Converts uploaded documents into plain text.
#[derive(Clone)]
pub struct TextExtractor {
    converter: Arc<dyn Converter>,
}

impl TextExtractor {
    /// Create an extractor that uses `converter` for legacy word-processor files.
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self { converter }
    }

    /// Create an extractor whose converter is the configured executable.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CommandConverter::new(config.doc_converter.clone())))
    }

    /// Extract text from `document`. Never fails; unsupported input yields `""`.
    pub fn extract(&self, document: &Document) -> String {
        let Some(kind) = ContentType::from_mime(&document.content_type) else {
            tracing::info!(
                content_type = %document.content_type,
                "Unsupported content type; nothing extracted"
            );
            return String::new();
        };

        let text = match kind {
            ContentType::Pdf => pdf::extract_pdf(&document.bytes),
            ContentType::LegacyWord => {
                converter::extract_legacy(&document.bytes, self.converter.as_ref())
            }
            ContentType::PlainText => decode_plain_text(&document.bytes),
        };
        tracing::info!(
            content_type = kind.mime(),
            bytes = document.bytes.len(),
            chars = text.chars().count(),
            "Extracted document text"
        );
        text
    }
}

/// Decode bytes as UTF-8, falling back to ISO-8859-1 which maps every byte to a character.
pub fn decode_plain_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(error) => {
            tracing::debug!(error = %error, "Input is not UTF-8; decoding as ISO-8859-1");
            bytes.iter().map(|&byte| char::from(byte)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::converter::ConverterError;
    use super::*;

    struct EchoConverter;

    impl Converter for EchoConverter {
        fn convert(&self, path: &Path) -> Result<String, ConverterError> {
            Ok(std::fs::read_to_string(path)?)
        }
    }

    fn extractor() -> TextExtractor {
        TextExtractor::new(Arc::new(EchoConverter))
    }

    #[test]
    fn mime_resolution_ignores_parameters_and_case() {
        assert_eq!(
            ContentType::from_mime("text/plain; charset=utf-8"),
            Some(ContentType::PlainText)
        );
        assert_eq!(
            ContentType::from_mime("Application/PDF"),
            Some(ContentType::Pdf)
        );
        assert_eq!(
            ContentType::from_mime(MIME_MSWORD),
            Some(ContentType::LegacyWord)
        );
        assert_eq!(ContentType::from_mime("image/png"), None);
    }

    #[test]
    fn extension_resolution_covers_upload_types() {
        assert_eq!(
            ContentType::from_path(Path::new("report.PDF")),
            Some(ContentType::Pdf)
        );
        assert_eq!(
            ContentType::from_path(Path::new("old.doc")),
            Some(ContentType::LegacyWord)
        );
        assert_eq!(
            ContentType::from_path(Path::new("notes.txt")),
            Some(ContentType::PlainText)
        );
        assert_eq!(ContentType::from_path(Path::new("slides.pptx")), None);
        assert_eq!(ContentType::from_path(Path::new("README")), None);
    }

    #[test]
    fn utf8_text_is_decoded_verbatim() {
        let document = Document::new("naïve café".as_bytes().to_vec(), MIME_TEXT);
        assert_eq!(extractor().extract(&document), "naïve café");
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        // 0xE9 is 'é' in ISO-8859-1 and an invalid lone byte in UTF-8.
        let document = Document::new(vec![b'c', b'a', b'f', 0xE9], MIME_TEXT);
        assert_eq!(extractor().extract(&document), "café");
    }

    #[test]
    fn latin1_decoding_accepts_every_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = decode_plain_text(&bytes);
        assert_eq!(text.chars().count(), 256);
    }

    #[test]
    fn unsupported_type_yields_empty_text() {
        let document = Document::new(b"PK\x03\x04".to_vec(), "application/zip");
        assert_eq!(extractor().extract(&document), "");
    }

    #[test]
    fn legacy_documents_route_through_converter() {
        let document = Document::new(b"converted words".to_vec(), MIME_MSWORD);
        assert_eq!(extractor().extract(&document), "converted words");
    }

    #[test]
    fn pdf_documents_route_through_pdf_extraction() {
        let bytes = pdf::tests::pdf_with_pages(&["routing check phrase"]);
        let document = Document::new(bytes, MIME_PDF);
        assert!(extractor().extract(&document).contains("routing check phrase"));

        let broken = Document::new(b"%PDF-broken".to_vec(), MIME_PDF);
        assert_eq!(extractor().extract(&broken), "");
    }
}
