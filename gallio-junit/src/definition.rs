// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative transformation definitions.
//!
//! A [`TransformDefinition`] describes how a Gallio report maps onto JUnit XML: which elements
//! and attributes to read, which step runs become suites and test cases, and how outcomes
//! translate to JUnit statuses. Definitions are TOML documents. A default definition for Gallio
//! reports is bundled with this crate, and [`DefinitionLoader`] abstracts over where the text
//! comes from.

use crate::errors::ConfigurationError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt};

/// The logical name of the bundled definition.
pub const BUNDLED_DEFINITION_NAME: &str = "gallio-to-junit.toml";

static BUNDLED_DEFINITION: &str = include_str!("gallio-to-junit.toml");

/// A source of transformation definition text.
pub trait DefinitionLoader: fmt::Debug + Send + Sync {
    /// A human-readable name for the source, used in error messages.
    fn source_name(&self) -> String;

    /// Loads the definition text.
    fn load(&self) -> Result<String, ConfigurationError>;
}

/// The definition bundled into this crate.
#[derive(Copy, Clone, Debug, Default)]
pub struct BundledDefinition;

impl BundledDefinition {
    /// Returns the bundled definition text.
    pub fn text() -> &'static str {
        BUNDLED_DEFINITION
    }
}

impl DefinitionLoader for BundledDefinition {
    fn source_name(&self) -> String {
        BUNDLED_DEFINITION_NAME.to_owned()
    }

    fn load(&self) -> Result<String, ConfigurationError> {
        Ok(BUNDLED_DEFINITION.to_owned())
    }
}

/// A definition read from a file on disk.
#[derive(Clone, Debug)]
pub struct FileDefinition {
    path: Utf8PathBuf,
}

impl FileDefinition {
    /// Creates a new loader for the given path.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path this loader reads from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl DefinitionLoader for FileDefinition {
    fn source_name(&self) -> String {
        self.path.to_string()
    }

    fn load(&self) -> Result<String, ConfigurationError> {
        std::fs::read_to_string(&self.path).map_err(|error| ConfigurationError::Read {
            path: self.path.clone(),
            error,
        })
    }
}

/// A parsed and validated transformation definition.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransformDefinition {
    /// The `name` attribute of the combined `<testsuites>` element.
    pub report_name: String,

    /// The namespace URI of source elements. Empty matches elements in any namespace.
    #[serde(default)]
    pub namespace: String,

    /// Local names of source elements.
    pub elements: ElementNames,

    /// Names of source attributes.
    pub attributes: AttributeNames,

    /// Which step runs become suites.
    pub suite: SuiteRule,

    /// Which step runs become test cases.
    pub case: CaseRule,

    /// How outcomes map to JUnit statuses.
    pub outcomes: OutcomeRules,

    /// Which log streams feed JUnit output elements.
    pub streams: StreamNames,
}

/// Local names of the source elements a definition reads.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ElementNames {
    /// A test step run; nested step runs form the tree.
    pub step_run: String,
    /// The step describing a run: names, metadata and code reference.
    pub step: String,
    /// Container of a step run's child runs.
    pub children: String,
    /// The result of a step run.
    pub result: String,
    /// Outcome element holding the status and category.
    pub outcome: String,
    /// Metadata container on a step.
    pub metadata: String,
    /// One metadata entry, keyed by an attribute.
    pub metadata_entry: String,
    /// A value inside a metadata entry.
    pub metadata_value: String,
    /// Code reference of a step, naming its declaring type.
    pub code_reference: String,
    /// Start time of a step run, used as the suite timestamp.
    pub start_time: String,
    /// Log attached to a step run.
    pub test_log: String,
    /// One named stream of a test log.
    pub stream: String,
    /// Text content inside a log stream.
    pub text: String,
}

/// Names of the source attributes a definition reads.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AttributeNames {
    /// Short name of a step.
    pub name: String,
    /// Fully qualified name of a step.
    pub full_name: String,
    /// Declaring type on a code reference.
    pub code_reference_type: String,
    /// Key of a metadata entry.
    pub entry_key: String,
    /// Duration of a result, in seconds.
    pub duration: String,
    /// Number of assertions in a result.
    pub assert_count: String,
    /// Status on an outcome.
    pub status: String,
    /// Category on an outcome, refining the status.
    pub category: String,
    /// Name of a log stream.
    pub stream_name: String,
}

/// Selects the step runs that become JUnit test suites.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SuiteRule {
    /// The metadata key that identifies the kind of a step.
    pub metadata_key: String,

    /// Step kinds that become suites.
    pub metadata_values: Vec<String>,

    /// Where the suite name comes from. The first present, non-empty source wins.
    pub name_from: Vec<NameSource>,
}

/// Selects the step runs that become JUnit test cases.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CaseRule {
    /// A boolean attribute on the step that marks test cases.
    pub marker_attribute: String,

    /// Where the test case name comes from.
    pub name_from: Vec<NameSource>,

    /// Where the test case class name comes from.
    pub classname_from: Vec<NameSource>,
}

/// A place to read a name from on a step.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NameSource {
    /// The type attribute of the step's code reference.
    CodeReferenceType,

    /// The step's full name.
    FullName,

    /// The step's short name.
    Name,
}

/// Maps outcome statuses to JUnit statuses.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutcomeRules {
    /// Used when no rule matches.
    pub default: OutcomeKind,

    /// Keyed by `status` or `status.category`.
    #[serde(default)]
    pub status: BTreeMap<String, OutcomeKind>,
}

impl OutcomeRules {
    /// Returns the JUnit status for an outcome.
    ///
    /// A `status.category` rule takes precedence over a plain `status` rule.
    pub fn resolve(&self, status: &str, category: Option<&str>) -> OutcomeKind {
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            if let Some(kind) = self.status.get(&format!("{status}.{category}")) {
                return *kind;
            }
        }
        self.status.get(status).copied().unwrap_or(self.default)
    }
}

/// A JUnit test case status.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// The test passed.
    Success,

    /// The test failed an expectation.
    Failure,

    /// The test hit an unexpected error.
    Error,

    /// The test did not run.
    Skipped,
}

/// Names of the log streams mapped onto JUnit output.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StreamNames {
    /// Stream whose text becomes the failure or error body.
    pub failure: String,
    /// Stream copied to `system-out`.
    pub system_out: String,
    /// Stream copied to `system-err`.
    pub system_err: String,
}

impl TransformDefinition {
    /// Parses and validates a definition.
    pub fn parse(source_name: &str, text: &str) -> Result<Self, ConfigurationError> {
        let definition: Self =
            toml::from_str(text).map_err(|error| ConfigurationError::Parse {
                source_name: source_name.to_owned(),
                error,
            })?;
        definition.validate(source_name)?;
        Ok(definition)
    }

    /// Loads, parses and validates a definition from a loader.
    pub fn load(loader: &dyn DefinitionLoader) -> Result<Self, ConfigurationError> {
        let text = loader.load()?;
        Self::parse(&loader.source_name(), &text)
    }

    fn validate(&self, source_name: &str) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::Invalid {
            source_name: source_name.to_owned(),
            reason: reason.to_owned(),
        };

        let ElementNames {
            step_run,
            step,
            children,
            result,
            outcome,
            metadata,
            metadata_entry,
            metadata_value,
            code_reference,
            start_time,
            test_log,
            stream,
            text,
        } = &self.elements;
        let element_names = [
            step_run,
            step,
            children,
            result,
            outcome,
            metadata,
            metadata_entry,
            metadata_value,
            code_reference,
            start_time,
            test_log,
            stream,
            text,
        ];
        if element_names.iter().any(|name| name.is_empty()) {
            return Err(invalid("element names must not be empty"));
        }

        if self.suite.metadata_key.is_empty() || self.suite.metadata_values.is_empty() {
            return Err(invalid("suite rule must name a metadata key and at least one value"));
        }
        if self.suite.name_from.is_empty() {
            return Err(invalid("suite.name-from must list at least one source"));
        }
        if self.case.marker_attribute.is_empty() {
            return Err(invalid("case.marker-attribute must not be empty"));
        }
        if self.case.name_from.is_empty() {
            return Err(invalid("case.name-from must list at least one source"));
        }

        Ok(())
    }
}
