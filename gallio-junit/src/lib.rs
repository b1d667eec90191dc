// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Convert [Gallio](https://github.com/Gallio/mbunit-v3) test reports into JUnit XML, one file
//! per test suite.
//!
//! Conversion runs in two stages:
//!
//! 1. A [`ReportTransform`](transform::ReportTransform) turns the source report into a single
//!    combined `<testsuites>` document. The bundled transform, [`GallioTransform`], is driven by
//!    a declarative [`TransformDefinition`](definition::TransformDefinition).
//! 2. A [`SuiteSplitter`](split::SuiteSplitter) writes each `<testsuite>` of the combined
//!    document to its own `TEST-<name>.xml` file.
//!
//! [`ReportConverter`] runs both stages and caches the compiled transform across calls.
//!
//! ```no_run
//! use camino::Utf8Path;
//! use gallio_junit::{ConverterOptions, ReportConverter};
//!
//! let converter = ReportConverter::new(&ConverterOptions::default());
//! let summary = converter
//!     .convert_path(Utf8Path::new("gallio-report.xml"), Utf8Path::new("junit"))
//!     .unwrap();
//! println!("wrote {} suites", summary.suite_count());
//! ```

pub mod converter;
pub mod definition;
pub mod errors;
pub mod naming;
pub mod options;
pub mod split;
pub mod transform;

pub use converter::{ConverterState, ReportConverter};
pub use errors::ConvertError;
pub use options::{ConverterOptions, IntermediateMode};
pub use split::SplitSummary;
pub use transform::GallioTransform;
