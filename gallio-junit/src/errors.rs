// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by gallio-junit.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, io, str::Utf8Error};
use thiserror::Error;

/// An error that occurred while converting a report.
///
/// Returned by [`ReportConverter::convert`](crate::converter::ReportConverter::convert). The three
/// variants are distinct failure classes: callers can retry I/O errors, but configuration and
/// parse errors will fail again on the same input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// The transformation definition could not be loaded or compiled.
    #[error("transformation definition is unusable")]
    Configuration(#[from] ConfigurationError),

    /// A document was not well-formed.
    #[error("failed to parse report")]
    Parse(#[from] ParseError),

    /// A filesystem or stream operation failed.
    #[error("I/O error while converting report")]
    Io(#[from] IoError),
}

/// An error that occurred while loading or compiling a transformation definition.
///
/// This always indicates a packaging or deployment problem rather than a transient condition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The definition file could not be read.
    #[error("failed to read transformation definition at `{path}`")]
    Read {
        /// The path that was read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The definition was not valid TOML, or did not match the definition format.
    #[error("failed to parse transformation definition `{source_name}`")]
    Parse {
        /// The logical name of the definition source.
        source_name: String,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The definition parsed but cannot be used.
    #[error("invalid transformation definition `{source_name}`: {reason}")]
    Invalid {
        /// The logical name of the definition source.
        source_name: String,

        /// Why the definition was rejected.
        reason: String,
    },
}

/// Which document failed to parse.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    /// The source report handed to the converter.
    Source,

    /// The combined JUnit document produced by the transform stage.
    Combined,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Source => write!(f, "source report"),
            DocumentKind::Combined => write!(f, "combined JUnit document"),
        }
    }
}

/// A line and column within a document, both starting at 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextPosition {
    /// The line number.
    pub line: u32,

    /// The column number.
    pub column: u32,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A document could not be parsed.
#[derive(Debug, Error)]
#[error("failed to parse {document}{}", .position.map(|p| format!(" at {p}")).unwrap_or_default())]
pub struct ParseError {
    document: DocumentKind,
    position: Option<TextPosition>,
    #[source]
    kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn xml(document: DocumentKind, error: roxmltree::Error) -> Self {
        let pos = error.pos();
        Self {
            document,
            position: Some(TextPosition {
                line: pos.row,
                column: pos.col,
            }),
            kind: ParseErrorKind::Xml(error),
        }
    }

    pub(crate) fn utf8(document: DocumentKind, error: Utf8Error) -> Self {
        Self {
            document,
            position: None,
            kind: ParseErrorKind::InvalidUtf8(error),
        }
    }

    /// Returns the document that failed to parse.
    pub fn document(&self) -> DocumentKind {
        self.document
    }

    /// Returns the position of the error, if known.
    pub fn position(&self) -> Option<TextPosition> {
        self.position
    }

    /// Returns the kind of parse failure.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

/// The reason a document could not be parsed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// The document was not well-formed XML.
    #[error("document is not well-formed XML")]
    Xml(#[source] roxmltree::Error),

    /// The document was not valid UTF-8.
    #[error("document is not valid UTF-8")]
    InvalidUtf8(#[source] Utf8Error),
}

/// The operation during which an I/O error occurred.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum IoOperation {
    /// Opening or reading the source report.
    ReadInput,

    /// Writing the combined document.
    WriteIntermediate,

    /// Reading the combined document back.
    ReadIntermediate,

    /// Creating a per-suite output file.
    CreateOutput,

    /// Writing or flushing a per-suite output file.
    WriteOutput,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOperation::ReadInput => write!(f, "reading input report"),
            IoOperation::WriteIntermediate => write!(f, "writing combined document"),
            IoOperation::ReadIntermediate => write!(f, "reading combined document"),
            IoOperation::CreateOutput => write!(f, "creating suite file"),
            IoOperation::WriteOutput => write!(f, "writing suite file"),
        }
    }
}

/// A filesystem or stream operation failed.
#[derive(Debug, Error)]
#[error("error {operation}{}", .path.as_ref().map(|p| format!(" at `{p}`")).unwrap_or_default())]
pub struct IoError {
    operation: IoOperation,
    path: Option<Utf8PathBuf>,
    #[source]
    error: io::Error,
}

impl IoError {
    pub(crate) fn new(operation: IoOperation, error: io::Error) -> Self {
        Self {
            operation,
            path: None,
            error,
        }
    }

    pub(crate) fn with_path(
        operation: IoOperation,
        path: impl Into<Utf8PathBuf>,
        error: io::Error,
    ) -> Self {
        Self {
            operation,
            path: Some(path.into()),
            error,
        }
    }

    /// Returns the operation that failed.
    pub fn operation(&self) -> IoOperation {
        self.operation
    }

    /// Returns the path being operated on, if any.
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        self.path.as_ref()
    }

    /// Returns the underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        &self.error
    }
}

/// An error that occurred while parsing converter options.
#[derive(Debug, Error)]
#[error("failed to parse gallio-junit config{}", .config_file.as_ref().map(|p| format!(" at `{p}`")).unwrap_or_default())]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the user config file, if one was provided.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}
