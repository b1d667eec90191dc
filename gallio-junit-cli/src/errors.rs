// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use gallio_junit::errors::{ConfigParseError, ConfigurationError, ConvertError};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

/// Documented exit codes for `gallio-junit` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum GallioJunitExitCode {}

impl GallioJunitExitCode {
    /// No errors occurred and all reports were converted.
    pub const OK: i32 = 0;

    /// The configuration file or the transformation definition could not be used.
    pub const SETUP_ERROR: i32 = 96;

    /// A source report could not be parsed.
    pub const PARSE_ERROR: i32 = 97;

    /// Reading or writing a file failed.
    pub const IO_ERROR: i32 = 98;

    /// Any other failure.
    pub const UNEXPECTED: i32 = 1;
}

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that `gallio-junit` knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to load transformation definition")]
    DefinitionLoadFailed {
        #[source]
        err: ConfigurationError,
    },
    #[error("failed to create output directory")]
    OutputDirCreateFailed {
        output_dir: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to convert report")]
    ConvertFailed {
        input: Utf8PathBuf,
        #[source]
        err: ConvertError,
    },
    #[error("error writing to output")]
    WriteOutputFailed {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn definition_load_failed(err: ConfigurationError) -> Self {
        Self::DefinitionLoadFailed { err }
    }

    pub(crate) fn output_dir_create_failed(
        output_dir: impl Into<Utf8PathBuf>,
        err: std::io::Error,
    ) -> Self {
        Self::OutputDirCreateFailed {
            output_dir: output_dir.into(),
            err,
        }
    }

    pub(crate) fn convert_failed(input: impl Into<Utf8PathBuf>, err: ConvertError) -> Self {
        Self::ConvertFailed {
            input: input.into(),
            err,
        }
    }

    pub(crate) fn write_output_failed(err: std::io::Error) -> Self {
        Self::WriteOutputFailed { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } | Self::DefinitionLoadFailed { .. } => {
                GallioJunitExitCode::SETUP_ERROR
            }
            Self::OutputDirCreateFailed { .. } | Self::WriteOutputFailed { .. } => {
                GallioJunitExitCode::IO_ERROR
            }
            Self::ConvertFailed { err, .. } => match err {
                ConvertError::Configuration(_) => GallioJunitExitCode::SETUP_ERROR,
                ConvertError::Parse(_) => GallioJunitExitCode::PARSE_ERROR,
                ConvertError::Io(_) => GallioJunitExitCode::IO_ERROR,
                _ => GallioJunitExitCode::UNEXPECTED,
            },
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::DefinitionLoadFailed { err } => {
                error!("{err}");
                err.source()
            }
            Self::OutputDirCreateFailed { output_dir, err } => {
                error!(
                    "failed to create output directory `{}`",
                    output_dir.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::ConvertFailed { input, err } => {
                error!("failed to convert `{}`", input.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::WriteOutputFailed { err } => {
                error!("failed to write to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
