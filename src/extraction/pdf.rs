//! Page-ordered PDF text extraction.

use thiserror::Error;

/// Errors raised while opening a PDF byte stream.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The parser rejected the document.
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    /// The parser panicked on malformed input.
    #[error("PDF parser panicked: {0}")]
    Panicked(String),
}

/// A document made of pages that can each yield plain text.
pub trait PagedDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;
    /// Text of the page at `index` (zero based).
    fn page_text(&self, index: usize) -> String;
}

/// PDF opened from memory with its text already split per page.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pages: Vec<String>,
}

impl PdfDocument {
    /// Open a PDF byte stream.
    ///
    /// `pdf-extract` can panic on malformed font tables, so the call runs under
    /// `catch_unwind` and a panic is reported as [`PdfError::Panicked`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let result =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
        match result {
            Ok(Ok(pages)) => Ok(Self { pages }),
            Ok(Err(error)) => Err(PdfError::Parse(error.to_string())),
            Err(payload) => {
                let message = if let Some(text) = payload.downcast_ref::<&str>() {
                    (*text).to_string()
                } else if let Some(text) = payload.downcast_ref::<String>() {
                    text.clone()
                } else {
                    "unknown panic".to_string()
                };
                Err(PdfError::Panicked(message))
            }
        }
    }
}

impl PagedDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> String {
        self.pages.get(index).cloned().unwrap_or_default()
    }
}

/// Concatenate every page's text in page order, with no separator between pages.
pub fn concatenate_pages<D: PagedDocument + ?Sized>(document: &D) -> String {
    let mut text = String::new();
    for index in 0..document.page_count() {
        text.push_str(&document.page_text(index));
    }
    text
}

/// Extract the text of a PDF byte stream, yielding an empty string when it cannot be opened.
pub fn extract_pdf(bytes: &[u8]) -> String {
    match PdfDocument::from_bytes(bytes) {
        Ok(document) => {
            let text = concatenate_pages(&document);
            tracing::debug!(
                pages = document.page_count(),
                chars = text.len(),
                "Extracted PDF text"
            );
            text
        }
        Err(error) => {
            tracing::warn!(error = %error, "PDF extraction failed; continuing with empty text");
            String::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    struct FakePdf {
        pages: Vec<&'static str>,
    }

    impl PagedDocument for FakePdf {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> String {
            self.pages[index].to_string()
        }
    }

    /// Build a small uncompressed PDF with one text line per page.
    pub(crate) fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
        let page_count = lines.len();
        // 1 catalog, 2 pages, 3 font, then (page, content) pairs.
        let mut objects: Vec<String> = Vec::new();
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids = (0..page_count)
            .map(|i| format!("{} 0 R", 4 + i * 2))
            .collect::<Vec<_>>()
            .join(" ");
        objects.push(format!(
            "<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"
        ));
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
        for (i, line) in lines.iter().enumerate() {
            let content_id = 5 + i * 2;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {content_id} 0 R /Resources << /Font << /F1 3 0 R >> >> >>"
            ));
            let stream = format!("BT /F1 12 Tf 100 700 Td ({line}) Tj ET");
            objects.push(format!(
                "<< /Length {} >>\nstream\n{stream}\nendstream",
                stream.len()
            ));
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn single_page_text_is_returned() {
        let document = FakePdf {
            pages: vec!["Sample text from PDF."],
        };
        assert_eq!(concatenate_pages(&document), "Sample text from PDF.");
    }

    #[test]
    fn zero_pages_yield_empty_text() {
        let document = FakePdf { pages: vec![] };
        assert_eq!(concatenate_pages(&document), "");
    }

    #[test]
    fn pages_are_concatenated_in_order() {
        let document = FakePdf {
            pages: vec!["Page 1 text.", "Page 2 text."],
        };
        assert_eq!(concatenate_pages(&document), "Page 1 text.Page 2 text.");
    }

    #[test]
    fn invalid_bytes_yield_empty_text() {
        assert_eq!(extract_pdf(b"not a pdf"), "");
        assert!(PdfDocument::from_bytes(b"not a pdf").is_err());
    }

    #[test]
    fn real_pdf_pages_keep_document_order() {
        let bytes = pdf_with_pages(&["alpha page phrase", "omega page phrase"]);
        let document = PdfDocument::from_bytes(&bytes).expect("pdf parses");
        assert_eq!(document.page_count(), 2);

        let text = extract_pdf(&bytes);
        let first = text.find("alpha").expect("first page text");
        let second = text.find("omega").expect("second page text");
        assert!(first < second, "page order lost: {text:?}");
    }
}
