// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gallio_junit::{
    ConverterOptions, IntermediateMode, ReportConverter,
    definition::TransformDefinition,
};
use std::{collections::BTreeSet, io::Write};
use tracing::{info, warn};

/// Convert Gallio test reports into per-suite JUnit XML files.
#[derive(Debug, Parser)]
#[command(version, name = "gallio-junit", styles = clap_styles::style())]
pub struct GallioJunitApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl GallioJunitApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output_writer: &mut dyn Write) -> Result<(), ExpectedError> {
        match self.command {
            Command::Convert(opts) => opts.exec(),
            Command::ShowDefinition(opts) => opts.exec(output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert Gallio reports into JUnit files
    ///
    /// Each input is converted in turn. Every test fixture in an input becomes a
    /// `TEST-<name>.xml` file in the output directory.
    Convert(ConvertOpts),

    /// Print the transformation definition in effect
    ShowDefinition(ShowDefinitionOpts),
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: built-in defaults]
    #[arg(long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Transformation definition to use instead of the bundled one
    #[arg(long, value_name = "FILE")]
    definition: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    /// Reads converter options from the config file, with `--definition` applied on top.
    fn make_options(&self) -> Result<ConverterOptions, ExpectedError> {
        let (mut options, unknown) = ConverterOptions::from_sources(self.config.as_deref())?;
        if let Some(config) = &self.config {
            warn_unknown_keys(config, &unknown);
        }
        if let Some(definition) = &self.definition {
            options.transform_definition_path = Some(definition.clone());
        }
        Ok(options)
    }
}

fn warn_unknown_keys(config_file: &Utf8Path, unknown: &BTreeSet<String>) {
    let mut unknown_str = String::new();
    match unknown.len() {
        0 => return,
        1 => {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        }
        _ => {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }
    }

    warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
}

#[derive(Debug, Args)]
struct ConvertOpts {
    /// Gallio report files to convert
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<Utf8PathBuf>,

    /// Directory to write JUnit files to, created if missing
    #[arg(long, short = 'o', value_name = "DIR")]
    output_dir: Utf8PathBuf,

    #[command(flatten)]
    config_opts: ConfigOpts,

    /// Prefix for output file names [default: TEST-]
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Suffix for output file names [default: .xml]
    #[arg(long, value_name = "SUFFIX")]
    suffix: Option<String>,

    /// Replace characters that are unsafe in file names with `_`
    #[arg(long)]
    sanitize_names: bool,

    /// Where to keep the combined JUnit document between stages
    #[arg(long, value_enum, value_name = "MODE")]
    intermediate: Option<IntermediateOpt>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum IntermediateOpt {
    /// Keep the combined document in memory
    InMemory,
    /// Write the combined document to temp-junit.xml in the output directory
    OnDisk,
}

impl From<IntermediateOpt> for IntermediateMode {
    fn from(opt: IntermediateOpt) -> Self {
        match opt {
            IntermediateOpt::InMemory => IntermediateMode::InMemory,
            IntermediateOpt::OnDisk => IntermediateMode::OnDisk,
        }
    }
}

impl ConvertOpts {
    fn make_options(&self) -> Result<ConverterOptions, ExpectedError> {
        let mut options = self.config_opts.make_options()?;
        if let Some(prefix) = &self.prefix {
            options.naming.prefix = prefix.clone();
        }
        if let Some(suffix) = &self.suffix {
            options.naming.suffix = suffix.clone();
        }
        if self.sanitize_names {
            options.naming.sanitize = true;
        }
        if let Some(intermediate) = self.intermediate {
            options.intermediate = intermediate.into();
        }
        Ok(options)
    }

    fn exec(self) -> Result<(), ExpectedError> {
        let options = self.make_options()?;

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|err| ExpectedError::output_dir_create_failed(&self.output_dir, err))?;

        let converter = ReportConverter::new(&options);
        for input in &self.inputs {
            let summary = converter
                .convert_path(input, &self.output_dir)
                .map_err(|err| ExpectedError::convert_failed(input, err))?;

            for (path, suites) in summary.collisions() {
                warn!(
                    "{} suites were written to {path}, only the last one was kept: {}",
                    suites.len(),
                    suites.join(", "),
                );
            }
            info!(
                "converted {input}: wrote {} suite {}",
                summary.suite_count(),
                if summary.suite_count() == 1 {
                    "file"
                } else {
                    "files"
                },
            );
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
struct ShowDefinitionOpts {
    #[command(flatten)]
    config_opts: ConfigOpts,
}

impl ShowDefinitionOpts {
    fn exec(self, output_writer: &mut dyn Write) -> Result<(), ExpectedError> {
        let options = self.config_opts.make_options()?;
        let loader = options.definition_loader();
        let text = loader
            .load()
            .map_err(ExpectedError::definition_load_failed)?;
        // Only print definitions that would actually work.
        TransformDefinition::parse(&loader.source_name(), &text)
            .map_err(ExpectedError::definition_load_failed)?;

        output_writer
            .write_all(text.as_bytes())
            .and_then(|()| output_writer.flush())
            .map_err(ExpectedError::write_output_failed)
    }
}
