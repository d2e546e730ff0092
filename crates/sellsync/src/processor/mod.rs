//! Uploaded files to plain text.
//!
//! Each [`TextSource`] handles a family of MIME types. OCR or document
//! converters plug in here; the core only relies on their text output.

pub mod text;

use mime_guess::Mime;

use crate::error::ExtractError;

pub trait TextSource: Send + Sync {
    fn supports(&self, mime: &Mime) -> bool;
    fn to_text(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractError>;
}

pub struct TextSourceRegistry {
    sources: Vec<Box<dyn TextSource>>,
}

impl TextSourceRegistry {
    /// A registry that understands plain-text uploads only.
    pub fn new() -> Self {
        Self {
            sources: vec![Box::new(text::PlainTextSource)],
        }
    }

    /// Adds a source ahead of the built-in ones.
    pub fn register(mut self, source: Box<dyn TextSource>) -> Self {
        self.sources.insert(0, source);
        self
    }

    /// Converts `bytes` to text, picking the source by the filename's MIME type.
    pub fn to_text(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();

        let source = self
            .sources
            .iter()
            .find(|s| s.supports(&mime))
            .ok_or_else(|| ExtractError::UnsupportedFormat(mime.essence_str().to_string()))?;

        let _span = tracing::info_span!("processor.to_text", mime = %mime.essence_str()).entered();
        source.to_text(bytes, filename)
    }
}

impl Default for TextSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
