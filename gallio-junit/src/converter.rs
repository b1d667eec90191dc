// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The end-to-end converter: a source report in, one JUnit file per suite out.
//!
//! A [`ReportConverter`] starts out unconfigured. The first conversion (or an explicit call to
//! [`ReportConverter::initialize`]) loads the transformation definition and compiles it into a
//! [`ReportTransform`], which is then cached and shared by every later conversion on the same
//! instance.

use crate::{
    definition::{DefinitionLoader, TransformDefinition},
    errors::{ConvertError, IoError, IoOperation},
    options::{ConverterOptions, IntermediateMode},
    split::{SplitSummary, SuiteSplitter},
    transform::{GallioTransform, ReportTransform},
};
use camino::Utf8Path;
use once_cell::sync::OnceCell;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    sync::Arc,
};
use tracing::debug;

/// The name of the intermediate file written in [`IntermediateMode::OnDisk`].
///
/// The file is read back and removed before any suite file is written, so a suite whose file name
/// matches it is kept.
pub const INTERMEDIATE_FILE_NAME: &str = "temp-junit.xml";

/// Whether a converter has compiled its transform yet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConverterState {
    /// The transformation definition has not been loaded.
    Unconfigured,

    /// The transform is compiled and cached.
    Ready,
}

/// Converts source reports into per-suite JUnit files.
///
/// `ReportConverter` is `Send + Sync`. Concurrent conversions on one instance share the cached
/// transform; if several of them race to initialize it, the definition is still loaded once.
#[derive(Debug)]
pub struct ReportConverter {
    loader: Box<dyn DefinitionLoader>,
    engine: OnceCell<Arc<dyn ReportTransform>>,
    splitter: SuiteSplitter,
    intermediate: IntermediateMode,
}

impl ReportConverter {
    /// Creates an unconfigured converter from options.
    pub fn new(options: &ConverterOptions) -> Self {
        Self::with_loader(options.definition_loader(), options)
    }

    /// Creates an unconfigured converter that reads its definition from `loader`.
    ///
    /// `options.transform_definition_path` is ignored.
    pub fn with_loader(loader: Box<dyn DefinitionLoader>, options: &ConverterOptions) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
            splitter: SuiteSplitter::new(options.namer()),
            intermediate: options.intermediate,
        }
    }

    /// Creates a converter that is ready at construction and uses `transform` for every
    /// conversion.
    pub fn with_transform(transform: Arc<dyn ReportTransform>, options: &ConverterOptions) -> Self {
        Self {
            loader: options.definition_loader(),
            engine: OnceCell::with_value(transform),
            splitter: SuiteSplitter::new(options.namer()),
            intermediate: options.intermediate,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConverterState {
        if self.engine.get().is_some() {
            ConverterState::Ready
        } else {
            ConverterState::Unconfigured
        }
    }

    /// Returns the intermediate mode.
    pub fn intermediate(&self) -> IntermediateMode {
        self.intermediate
    }

    /// Returns the splitter.
    pub fn splitter(&self) -> &SuiteSplitter {
        &self.splitter
    }

    /// Loads and compiles the transformation definition if that hasn't happened yet, and
    /// returns the cached transform.
    ///
    /// On failure the converter stays unconfigured, and the next call tries again.
    pub fn initialize(&self) -> Result<&dyn ReportTransform, ConvertError> {
        let engine = self.engine.get_or_try_init(|| {
            debug!(source = %self.loader.source_name(), "loading transformation definition");
            let definition = TransformDefinition::load(self.loader.as_ref())?;
            let transform: Arc<dyn ReportTransform> = Arc::new(GallioTransform::new(definition));
            Ok::<_, ConvertError>(transform)
        })?;
        Ok(&**engine)
    }

    /// Converts the report read from `input`, writing one file per suite into `output_dir`.
    ///
    /// `output_dir` must exist. Files written before a failure are left in place.
    pub fn convert(
        &self,
        mut input: impl Read,
        output_dir: &Utf8Path,
    ) -> Result<SplitSummary, ConvertError> {
        let engine = self.initialize()?;

        let summary = match self.intermediate {
            IntermediateMode::InMemory => {
                debug!("transforming source report");
                let mut combined = Vec::new();
                engine.transform(&mut input, &mut combined)?;
                debug!(bytes = combined.len(), "splitting combined document");
                self.splitter.split(combined.as_slice(), output_dir)?
            }
            IntermediateMode::OnDisk => {
                let path = output_dir.join(INTERMEDIATE_FILE_NAME);
                let result = transform_on_disk(engine, &mut input, &path);
                remove_intermediate(&path);
                let combined = result?;
                debug!(%path, bytes = combined.len(), "splitting combined document");
                self.splitter.split(combined.as_slice(), output_dir)?
            }
        };

        debug!(suites = summary.suite_count(), "conversion complete");
        Ok(summary)
    }

    /// Converts the report at `input_path`, writing one file per suite into `output_dir`.
    pub fn convert_path(
        &self,
        input_path: &Utf8Path,
        output_dir: &Utf8Path,
    ) -> Result<SplitSummary, ConvertError> {
        let bytes = fs::read(input_path)
            .map_err(|error| IoError::with_path(IoOperation::ReadInput, input_path, error))?;
        debug!(input = %input_path, "read source report");
        self.convert(bytes.as_slice(), output_dir)
    }
}

/// Transforms `input` into the intermediate file at `path` and reads the combined document back.
fn transform_on_disk(
    engine: &dyn ReportTransform,
    input: &mut dyn Read,
    path: &Utf8Path,
) -> Result<Vec<u8>, ConvertError> {
    debug!(%path, "transforming source report");
    let file = File::create(path)
        .map_err(|error| IoError::with_path(IoOperation::WriteIntermediate, path, error))?;
    let mut writer = BufWriter::new(file);
    engine.transform(input, &mut writer)?;
    writer
        .flush()
        .map_err(|error| IoError::with_path(IoOperation::WriteIntermediate, path, error))?;
    drop(writer);

    let combined = fs::read(path)
        .map_err(|error| IoError::with_path(IoOperation::ReadIntermediate, path, error))?;
    Ok(combined)
}

fn remove_intermediate(path: &Utf8Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            debug!(%path, %error, "intermediate file could not be removed");
        }
    }
}
