use mime_guess::{mime, Mime};

use crate::error::ExtractError;
use crate::processor::TextSource;

/// UTF-8 text, CSV, JSON and Markdown uploads.
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn supports(&self, mime: &Mime) -> bool {
        mime.type_() == mime::TEXT || *mime == mime::APPLICATION_JSON
    }

    fn to_text(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            ExtractError::TextExtraction(format!("'{}' is not valid UTF-8: {}", filename, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bom() {
        let text = PlainTextSource
            .to_text(b"\xEF\xBB\xBFScarf 10 EUR", "list.txt")
            .unwrap();
        assert_eq!(text, "Scarf 10 EUR");
    }

    #[test]
    fn test_invalid_utf8() {
        let result = PlainTextSource.to_text(&[0xff, 0xfe, 0x00], "list.txt");
        assert!(matches!(result, Err(ExtractError::TextExtraction(_))));
    }

    #[test]
    fn test_supports() {
        assert!(PlainTextSource.supports(&mime::TEXT_PLAIN));
        assert!(PlainTextSource.supports(&mime::TEXT_CSV));
        assert!(PlainTextSource.supports(&mime::APPLICATION_JSON));
        assert!(!PlainTextSource.supports(&mime::IMAGE_PNG));
    }
}
