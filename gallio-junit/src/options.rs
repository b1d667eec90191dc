// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converter options and their configuration-file representation.

use crate::{
    definition::{BundledDefinition, DefinitionLoader, FileDefinition},
    errors::ConfigParseError,
    naming::{DEFAULT_PREFIX, DEFAULT_SUFFIX, SuiteFileNamer},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Options for a [`ReportConverter`](crate::converter::ReportConverter).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConverterOptions {
    /// A transformation definition that replaces the bundled one.
    #[serde(default)]
    pub transform_definition_path: Option<Utf8PathBuf>,

    /// Where the combined document lives between stages.
    #[serde(default)]
    pub intermediate: IntermediateMode,

    /// How output files are named.
    #[serde(default)]
    pub naming: NamingOptions,
}

/// Where the combined document is kept between the transform and split stages.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IntermediateMode {
    /// Keep it in memory.
    #[default]
    InMemory,

    /// Write it to a temporary file in the output directory, removed after the split.
    OnDisk,
}

/// File naming options.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct NamingOptions {
    /// Prepended to every suite name.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Appended to every suite name.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Replace characters that are unsafe in file names.
    #[serde(default)]
    pub sanitize: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
            sanitize: false,
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_owned()
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_owned()
}

impl ConverterOptions {
    /// The default configuration, embedded in the crate.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads options from the default configuration, layered under `config_file` if given.
    ///
    /// Returns the options along with any keys that were not recognized.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }

        let config = builder
            .build()
            .map_err(|err| ConfigParseError::new(config_file.map(ToOwned::to_owned), err))?;

        let mut ignored = BTreeSet::new();
        let options: Self = serde_ignored::deserialize(config, |path| {
            ignored.insert(path.to_string());
        })
        .map_err(|err| ConfigParseError::new(config_file.map(ToOwned::to_owned), err))?;

        Ok((options, ignored))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Returns the loader for the configured transformation definition.
    pub fn definition_loader(&self) -> Box<dyn DefinitionLoader> {
        match &self.transform_definition_path {
            Some(path) => Box::new(FileDefinition::new(path.clone())),
            None => Box::new(BundledDefinition),
        }
    }

    /// Returns the file namer for these options.
    pub fn namer(&self) -> SuiteFileNamer {
        SuiteFileNamer::new(self.naming.prefix.clone(), self.naming.suffix.clone())
            .sanitized(self.naming.sanitize)
    }
}
