//! Document loading: uploaded bytes to plain text.
//!
//! The [`DocumentLoader`] trait is the seam the HTTP layer depends on.
//! [`PdfLoader`] is the production implementation, backed by `lopdf`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bilancio_chat::document::{DocumentLoader, PdfLoader};
//!
//! let loaded = PdfLoader::new().load(&bytes).await?;
//! println!("{} pages, {} chars", loaded.page_count, loaded.text.len());
//! ```

mod pdf;

pub use pdf::{PdfLoader, collect_pages, extract_pdf_text, join_pages};

use async_trait::async_trait;

/// MIME type accepted for uploads.
pub const PDF_MIME: &str = "application/pdf";

/// Text extracted from an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// Page texts in document order, each followed by `\n`.
    pub text: String,
    /// Number of pages in the source document.
    pub page_count: usize,
}

/// Errors that can occur while extracting text from an upload.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Nothing was uploaded.
    #[error("the uploaded file is empty")]
    Empty,

    /// The upload is not a PDF.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The parser could not read the stream.
    #[error("unable to read PDF: {0}")]
    Unreadable(String),

    /// The document parsed but holds no extractable text (e.g. a scan).
    #[error("no text could be extracted from the {pages}-page document")]
    NoText {
        /// Number of pages inspected.
        pages: usize,
    },

    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Extracts plain text from an uploaded document.
#[async_trait]
pub trait DocumentLoader: Send + Sync + std::fmt::Debug {
    /// Load a document from its raw bytes.
    async fn load(&self, bytes: &[u8]) -> Result<LoadedDocument, ExtractionError>;

    /// Get the loader name for logging.
    fn loader_name(&self) -> &'static str;
}

/// Check that an upload is a PDF, by declared content type or file name.
///
/// `application/octet-stream` is what browsers send when they don't know;
/// the file name decides in that case.
pub fn ensure_pdf(content_type: Option<&str>, filename: Option<&str>) -> Result<(), ExtractionError> {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| ct != "application/octet-stream");

    let resolved = declared.or_else(|| {
        filename.map(|name| {
            mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    });

    match resolved {
        Some(mime) if mime == PDF_MIME => Ok(()),
        Some(mime) => Err(ExtractionError::UnsupportedType(mime)),
        None => Err(ExtractionError::UnsupportedType(
            "application/octet-stream".to_string(),
        )),
    }
}
