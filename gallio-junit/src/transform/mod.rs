// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The structural transform stage: source report bytes in, combined JUnit document out.

mod gallio;

pub use gallio::GallioTransform;

use crate::errors::{ConvertError, DocumentKind, ParseError};
use roxmltree::{Document, ParsingOptions};
use std::{
    fmt,
    io::{Read, Write},
};

/// Transforms a source report into a combined JUnit document.
///
/// The output must be a `<testsuites>` document. Implementations hold no per-document state, so
/// a single instance can be shared across threads and reused for any number of conversions.
pub trait ReportTransform: fmt::Debug + Send + Sync {
    /// Reads a source report from `input` and writes the combined document to `output`.
    ///
    /// On failure, `output` may hold a partial document that must be discarded.
    fn transform(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), ConvertError>;
}

static UTF8_BOM: &str = "\u{feff}";

/// Decodes a document as UTF-8, dropping a leading byte order mark.
pub(crate) fn decode(bytes: &[u8], document: DocumentKind) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|error| ParseError::utf8(document, error))?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
}

/// Parses a decoded document into a read-only tree.
///
/// A `<!DOCTYPE>` declaration is accepted; entities declared in an internal subset are expanded.
pub(crate) fn parse(text: &str, document: DocumentKind) -> Result<Document<'_>, ParseError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).map_err(|error| ParseError::xml(document, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParseErrorKind;

    #[test]
    fn decode_strips_bom() {
        let bytes = b"\xef\xbb\xbf<a/>";
        assert_eq!(decode(bytes, DocumentKind::Source).unwrap(), "<a/>");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let error = decode(b"<a>\xff</a>", DocumentKind::Combined).unwrap_err();
        assert_eq!(error.document(), DocumentKind::Combined);
        assert!(matches!(error.kind(), ParseErrorKind::InvalidUtf8(_)));
        assert_eq!(error.position(), None);
    }

    #[test]
    fn parse_accepts_doctype() {
        let text = r#"<?xml version="1.0"?><!DOCTYPE a [<!ENTITY who "world">]><a>&who;</a>"#;
        let document = parse(text, DocumentKind::Source).unwrap();
        assert_eq!(document.root_element().text(), Some("world"));
    }

    #[test]
    fn parse_reports_position() {
        let error = parse("<a>\n<b></a>", DocumentKind::Combined).unwrap_err();
        assert_eq!(error.document(), DocumentKind::Combined);
        assert!(matches!(error.kind(), ParseErrorKind::Xml(_)));
        assert!(error.position().is_some());
    }
}
