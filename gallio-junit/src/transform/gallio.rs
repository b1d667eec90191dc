// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Definition-driven mapping from Gallio reports to JUnit.

use super::{ReportTransform, decode, parse};
use crate::{
    definition::{NameSource, OutcomeKind, TransformDefinition},
    errors::{ConvertError, DocumentKind, IoError, IoOperation, ParseError},
};
use chrono::{DateTime, FixedOffset};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use roxmltree::Node;
use std::{
    collections::HashSet,
    io::{self, Read, Write},
    time::Duration,
};

/// A [`ReportTransform`] that maps Gallio reports to JUnit according to a
/// [`TransformDefinition`].
///
/// Every step run whose kind is listed in the suite rule becomes a `<testsuite>`, in document
/// order. Step runs marked as test cases become `<testcase>` elements of the closest enclosing
/// suite.
#[derive(Clone, Debug)]
pub struct GallioTransform {
    definition: TransformDefinition,
    suite_kinds: HashSet<String>,
}

impl GallioTransform {
    /// Compiles a definition into a transform.
    pub fn new(definition: TransformDefinition) -> Self {
        let suite_kinds = definition.suite.metadata_values.iter().cloned().collect();
        Self {
            definition,
            suite_kinds,
        }
    }

    /// Returns the definition this transform was compiled from.
    pub fn definition(&self) -> &TransformDefinition {
        &self.definition
    }

    /// Builds the combined JUnit report for a Gallio document.
    pub fn build_report(&self, text: &str) -> Result<Report, ParseError> {
        let document = parse(text, DocumentKind::Source)?;

        let mut report = Report::new(self.definition.report_name.as_str());
        let suites = document
            .root()
            .descendants()
            .filter(|node| self.is_element(*node, &self.definition.elements.step_run))
            .filter(|run| self.is_suite(*run))
            .map(|run| self.build_suite(run));
        report.add_test_suites(suites);
        Ok(report)
    }

    fn build_suite(&self, run: Node<'_, '_>) -> TestSuite {
        let step = self.child(run, &self.definition.elements.step);
        let name = step
            .and_then(|step| self.name(step, &self.definition.suite.name_from))
            .unwrap_or_default();

        let mut suite = TestSuite::new(name);
        if let Some(time) = self.duration(run) {
            suite.set_time(time);
        }
        if let Some(timestamp) = self.start_time(run) {
            suite.set_timestamp(timestamp);
        }
        if let Some(step) = step {
            for (key, value) in self.metadata_entries(step) {
                suite.add_property((key, value));
            }
        }

        let mut case_runs = Vec::new();
        self.collect_cases(run, &mut case_runs);
        for case_run in case_runs {
            suite.add_test_case(self.build_case(case_run));
        }

        suite
    }

    fn build_case(&self, run: Node<'_, '_>) -> TestCase {
        let elements = &self.definition.elements;
        let attributes = &self.definition.attributes;

        let step = self.child(run, &elements.step);
        let name = step
            .and_then(|step| self.name(step, &self.definition.case.name_from))
            .unwrap_or_default();
        let classname =
            step.and_then(|step| self.name(step, &self.definition.case.classname_from));

        let result = self.child(run, &elements.result);
        let outcome = result.and_then(|result| self.child(result, &elements.outcome));
        let status = outcome
            .and_then(|outcome| outcome.attribute(attributes.status.as_str()))
            .unwrap_or_default();
        let category = outcome
            .and_then(|outcome| outcome.attribute(attributes.category.as_str()))
            .filter(|category| !category.is_empty());

        let kind = self.definition.outcomes.resolve(status, category);
        let mut testcase_status = match kind {
            OutcomeKind::Success => TestCaseStatus::success(),
            OutcomeKind::Failure => TestCaseStatus::non_success(NonSuccessKind::Failure),
            OutcomeKind::Error => TestCaseStatus::non_success(NonSuccessKind::Error),
            OutcomeKind::Skipped => TestCaseStatus::skipped(),
        };
        if kind != OutcomeKind::Success {
            if let Some(failure) = self.stream_text(run, &self.definition.streams.failure) {
                if let Some(message) = first_line(&failure) {
                    testcase_status.set_message(message);
                }
                testcase_status.set_description(failure);
            }
            if let Some(category) = category {
                testcase_status.set_type(category);
            }
        }

        let mut testcase = TestCase::new(name, testcase_status);
        if let Some(classname) = classname {
            testcase.set_classname(classname);
        }
        if let Some(time) = self.duration(run) {
            testcase.set_time(time);
        }
        if let Some(timestamp) = self.start_time(run) {
            testcase.set_timestamp(timestamp);
        }
        if let Some(assertions) = result
            .and_then(|result| result.attribute(attributes.assert_count.as_str()))
            .and_then(|count| count.trim().parse::<usize>().ok())
        {
            testcase.set_assertions(assertions);
        }
        if let Some(system_out) = self.stream_text(run, &self.definition.streams.system_out) {
            testcase.set_system_out(system_out);
        }
        if let Some(system_err) = self.stream_text(run, &self.definition.streams.system_err) {
            testcase.set_system_err(system_err);
        }

        testcase
    }

    /// Collects the test case runs under `run` in document order, without entering nested suites.
    fn collect_cases<'a, 'input>(&self, run: Node<'a, 'input>, out: &mut Vec<Node<'a, 'input>>) {
        let elements = &self.definition.elements;
        let Some(children) = self.child(run, &elements.children) else {
            return;
        };
        for child in children
            .children()
            .filter(|node| self.is_element(*node, &elements.step_run))
        {
            if self.is_suite(child) {
                continue;
            }
            if self.is_case(child) {
                out.push(child);
            } else {
                self.collect_cases(child, out);
            }
        }
    }

    fn is_element(&self, node: Node<'_, '_>, local_name: &str) -> bool {
        if !node.is_element() || node.tag_name().name() != local_name {
            return false;
        }
        self.definition.namespace.is_empty()
            || node.tag_name().namespace() == Some(self.definition.namespace.as_str())
    }

    fn child<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        local_name: &str,
    ) -> Option<Node<'a, 'input>> {
        node.children()
            .find(|child| self.is_element(*child, local_name))
    }

    fn is_suite(&self, run: Node<'_, '_>) -> bool {
        let Some(step) = self.child(run, &self.definition.elements.step) else {
            return false;
        };
        self.metadata_entries(step).any(|(key, value)| {
            key == self.definition.suite.metadata_key && self.suite_kinds.contains(value)
        })
    }

    fn is_case(&self, run: Node<'_, '_>) -> bool {
        self.child(run, &self.definition.elements.step)
            .and_then(|step| step.attribute(self.definition.case.marker_attribute.as_str()))
            .is_some_and(|marker| marker.trim().eq_ignore_ascii_case("true"))
    }

    /// Returns `(key, value)` pairs from a step's metadata, one per value, in document order.
    fn metadata_entries<'a>(
        &'a self,
        step: Node<'a, '_>,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let elements = &self.definition.elements;
        let key_attribute = self.definition.attributes.entry_key.as_str();
        self.child(step, &elements.metadata)
            .into_iter()
            .flat_map(move |metadata| {
                metadata
                    .children()
                    .filter(move |entry| self.is_element(*entry, &elements.metadata_entry))
            })
            .flat_map(move |entry| {
                let key = entry.attribute(key_attribute).unwrap_or_default();
                entry
                    .children()
                    .filter(move |value| self.is_element(*value, &elements.metadata_value))
                    .map(move |value| (key, value.text().unwrap_or_default().trim()))
            })
    }

    fn name(&self, step: Node<'_, '_>, sources: &[NameSource]) -> Option<String> {
        let attributes = &self.definition.attributes;
        sources.iter().find_map(|source| {
            let value = match source {
                NameSource::CodeReferenceType => self
                    .child(step, &self.definition.elements.code_reference)
                    .and_then(|code_ref| {
                        code_ref.attribute(attributes.code_reference_type.as_str())
                    }),
                NameSource::FullName => step.attribute(attributes.full_name.as_str()),
                NameSource::Name => step.attribute(attributes.name.as_str()),
            };
            value.filter(|value| !value.is_empty()).map(str::to_owned)
        })
    }

    fn duration(&self, run: Node<'_, '_>) -> Option<Duration> {
        let seconds = self
            .child(run, &self.definition.elements.result)?
            .attribute(self.definition.attributes.duration.as_str())?
            .trim()
            .parse::<f64>()
            .ok()?;
        Duration::try_from_secs_f64(seconds).ok()
    }

    fn start_time(&self, run: Node<'_, '_>) -> Option<DateTime<FixedOffset>> {
        let text = self
            .child(run, &self.definition.elements.start_time)?
            .text()?;
        DateTime::parse_from_rfc3339(text.trim()).ok()
    }

    /// Concatenates the text of a named log stream, or `None` if it is absent or blank.
    fn stream_text(&self, run: Node<'_, '_>, stream_name: &str) -> Option<String> {
        let elements = &self.definition.elements;
        let stream = self
            .child(run, &elements.test_log)?
            .descendants()
            .find(|node| {
                self.is_element(*node, &elements.stream)
                    && node.attribute(self.definition.attributes.stream_name.as_str())
                        == Some(stream_name)
            })?;

        let text: String = stream
            .descendants()
            .filter(|node| self.is_element(*node, &elements.text))
            .filter_map(|node| node.text())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl ReportTransform for GallioTransform {
    fn transform(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), ConvertError> {
        let mut bytes = Vec::new();
        input
            .read_to_end(&mut bytes)
            .map_err(|error| IoError::new(IoOperation::ReadInput, error))?;
        let text = decode(&bytes, DocumentKind::Source)?;

        let report = self.build_report(text)?;
        report.serialize(output).map_err(|error| {
            IoError::new(IoOperation::WriteIntermediate, io::Error::other(error))
        })?;
        Ok(())
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BundledDefinition;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    static CALCULATOR_REPORT: &str =
        include_str!("../../../fixtures/gallio/calculator-report.xml");

    fn bundled() -> GallioTransform {
        GallioTransform::new(TransformDefinition::load(&BundledDefinition).unwrap())
    }

    fn transform_to_string(transform: &GallioTransform, input: &str) -> String {
        let mut output = Vec::new();
        transform
            .transform(&mut input.as_bytes(), &mut output)
            .expect("transform succeeds");
        String::from_utf8(output).expect("output is UTF-8")
    }

    fn suite_names(combined: &str) -> Vec<String> {
        let document = Document::parse(combined).unwrap();
        let root = document.root_element();
        assert_eq!(root.tag_name().name(), "testsuites");
        root.children()
            .filter(|node| node.has_tag_name("testsuite"))
            .map(|suite| suite.attribute("name").unwrap().to_owned())
            .collect()
    }

    #[test]
    fn fixtures_become_suites_in_document_order() {
        let combined = transform_to_string(&bundled(), CALCULATOR_REPORT);
        assert_eq!(
            suite_names(&combined),
            vec![
                "Calculator.Tests.AdditionTests".to_owned(),
                "Calculator.Tests.DivisionTests".to_owned(),
            ]
        );

        let document = Document::parse(&combined).unwrap();
        assert_eq!(document.root_element().attribute("name"), Some("gallio"));
    }

    #[test]
    fn suite_counts_and_properties() {
        let combined = transform_to_string(&bundled(), CALCULATOR_REPORT);
        let document = Document::parse(&combined).unwrap();
        let suites: Vec<_> = document
            .descendants()
            .filter(|node| node.has_tag_name("testsuite"))
            .collect();

        let addition = suites[0];
        assert_eq!(addition.attribute("tests"), Some("2"));
        assert_eq!(addition.attribute("failures"), Some("1"));
        assert_eq!(addition.attribute("errors"), Some("0"));
        assert_eq!(addition.attribute("time"), Some("0.750"));
        let properties: Vec<_> = addition
            .descendants()
            .filter(|node| node.has_tag_name("property"))
            .map(|property| {
                (
                    property.attribute("name").unwrap(),
                    property.attribute("value").unwrap(),
                )
            })
            .collect();
        assert_eq!(
            properties,
            vec![
                ("TestKind", "Fixture"),
                ("Category", "Math"),
                ("Category", "Fast"),
            ]
        );

        let division = suites[1];
        assert_eq!(division.attribute("tests"), Some("2"));
        assert_eq!(division.attribute("failures"), Some("0"));
        assert_eq!(division.attribute("errors"), Some("1"));
    }

    #[test]
    fn test_cases_carry_status_and_output() {
        let report = bundled().build_report(CALCULATOR_REPORT).unwrap();
        let mut combined = Vec::new();
        report.serialize(&mut combined).unwrap();
        let combined = String::from_utf8(combined).unwrap();
        let document = Document::parse(&combined).unwrap();

        let case = |name: &str| {
            document
                .descendants()
                .find(|node| node.has_tag_name("testcase") && node.attribute("name") == Some(name))
                .unwrap_or_else(|| panic!("test case {name} present"))
        };
        let child_text = |node: Node<'_, '_>, tag: &str| {
            node.children()
                .find(|child| child.has_tag_name(tag))
                .and_then(|child| child.text())
                .map(str::to_owned)
        };

        let adds_positive = case("AddsPositive");
        assert_eq!(
            adds_positive.attribute("classname"),
            Some("Calculator.Tests.AdditionTests")
        );
        assert_eq!(adds_positive.attribute("assertions"), Some("2"));
        assert_eq!(adds_positive.attribute("time"), Some("0.250"));
        assert_eq!(
            child_text(adds_positive, "system-out").as_deref(),
            Some("adding 2 and 3\n")
        );
        assert!(
            !adds_positive
                .children()
                .any(|child| child.has_tag_name("failure") || child.has_tag_name("error")),
        );

        let adds_negative = case("AddsNegative");
        let failure = adds_negative
            .children()
            .find(|child| child.has_tag_name("failure"))
            .expect("failure element present");
        assert_eq!(
            failure.attribute("message"),
            Some("Expected values to be equal.")
        );
        assert_eq!(
            failure.text(),
            Some("Expected values to be equal.\nat Calculator.Tests.AdditionTests.AddsNegative()")
        );
        assert_eq!(
            child_text(adds_negative, "system-err").as_deref(),
            Some("negative operand")
        );

        let divides_by_zero = case("DividesByZero");
        let error = divides_by_zero
            .children()
            .find(|child| child.has_tag_name("error"))
            .expect("error element present");
        assert_eq!(error.attribute("type"), Some("error"));
        assert_eq!(
            error.attribute("message"),
            Some("System.DivideByZeroException: Attempted to divide by zero.")
        );

        let divides_fractions = case("DividesFractions");
        let skipped = divides_fractions
            .children()
            .find(|child| child.has_tag_name("skipped"))
            .expect("skipped element present");
        assert_eq!(skipped.attribute("type"), Some("ignored"));
    }

    #[test]
    fn nested_fixtures_are_separate_suites() {
        let input = indoc! {r#"
            <report xmlns="http://www.gallio.org/">
              <testStepRun>
                <testStep name="Outer" isTestCase="false">
                  <metadata><entry key="TestKind"><value>Fixture</value></entry></metadata>
                </testStep>
                <children>
                  <testStepRun>
                    <testStep name="OuterTest" isTestCase="true" />
                    <result duration="0.1"><outcome status="passed" /></result>
                  </testStepRun>
                  <testStepRun>
                    <testStep name="Inner" isTestCase="false">
                      <metadata><entry key="TestKind"><value>Fixture</value></entry></metadata>
                    </testStep>
                    <children>
                      <testStepRun>
                        <testStep name="InnerTest" isTestCase="true" />
                        <result><outcome status="failed" /></result>
                      </testStepRun>
                    </children>
                  </testStepRun>
                  <testStepRun>
                    <testStep name="RowTest" isTestCase="false" />
                    <children>
                      <testStepRun>
                        <testStep name="RowTest(1)" isTestCase="true" />
                        <result><outcome status="passed" /></result>
                      </testStepRun>
                    </children>
                  </testStepRun>
                </children>
              </testStepRun>
            </report>
        "#};

        let report = bundled().build_report(input).unwrap();
        let mut combined = Vec::new();
        report.serialize(&mut combined).unwrap();
        let combined = String::from_utf8(combined).unwrap();
        assert_eq!(
            suite_names(&combined),
            vec!["Outer".to_owned(), "Inner".to_owned()]
        );

        let document = Document::parse(&combined).unwrap();
        let cases_of = |suite_name: &str| -> Vec<String> {
            document
                .descendants()
                .find(|node| {
                    node.has_tag_name("testsuite") && node.attribute("name") == Some(suite_name)
                })
                .unwrap()
                .children()
                .filter(|node| node.has_tag_name("testcase"))
                .map(|case| case.attribute("name").unwrap().to_owned())
                .collect()
        };
        assert_eq!(
            cases_of("Outer"),
            vec!["OuterTest".to_owned(), "RowTest(1)".to_owned()]
        );
        assert_eq!(cases_of("Inner"), vec!["InnerTest".to_owned()]);
    }

    #[test]
    fn elements_outside_namespace_are_ignored() {
        let input = indoc! {r#"
            <report xmlns="urn:something-else">
              <testStepRun>
                <testStep name="Fixture" isTestCase="false">
                  <metadata><entry key="TestKind"><value>Fixture</value></entry></metadata>
                </testStep>
              </testStepRun>
            </report>
        "#};
        let combined = transform_to_string(&bundled(), input);
        assert!(suite_names(&combined).is_empty());
    }

    #[test]
    fn doctype_is_accepted() {
        let input = indoc! {r#"
            <?xml version="1.0" encoding="utf-8"?>
            <!DOCTYPE report>
            <report xmlns="http://www.gallio.org/">
              <testStepRun>
                <testStep name="Fixture" isTestCase="false">
                  <metadata><entry key="TestKind"><value>Fixture</value></entry></metadata>
                </testStep>
              </testStepRun>
            </report>
        "#};
        let combined = transform_to_string(&bundled(), input);
        assert_eq!(suite_names(&combined), vec!["Fixture".to_owned()]);
    }

    #[test]
    fn unparseable_numbers_are_ignored() {
        let input = indoc! {r#"
            <report xmlns="http://www.gallio.org/">
              <testStepRun>
                <testStep name="Fixture" isTestCase="false">
                  <metadata><entry key="TestKind"><value>Fixture</value></entry></metadata>
                </testStep>
                <startTime>yesterday</startTime>
                <result duration="-1" />
                <children>
                  <testStepRun>
                    <testStep name="Case" isTestCase="true" />
                    <result duration="soon" assertCount="many"><outcome status="passed" /></result>
                  </testStepRun>
                </children>
              </testStepRun>
            </report>
        "#};
        let combined = transform_to_string(&bundled(), input);
        let document = Document::parse(&combined).unwrap();
        let suite = document
            .descendants()
            .find(|node| node.has_tag_name("testsuite"))
            .unwrap();
        assert_eq!(suite.attribute("time"), None);
        assert_eq!(suite.attribute("timestamp"), None);
        let case = suite
            .children()
            .find(|node| node.has_tag_name("testcase"))
            .unwrap();
        assert_eq!(case.attribute("time"), None);
        assert_eq!(case.attribute("assertions"), None);
    }

    #[test]
    fn malformed_source_is_parse_error() {
        let mut output = Vec::new();
        let error = bundled()
            .transform(&mut "<report><testStepRun></report>".as_bytes(), &mut output)
            .unwrap_err();
        match error {
            ConvertError::Parse(error) => {
                assert_eq!(error.document(), DocumentKind::Source);
                assert!(error.position().is_some());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  \n  boom  \nmore"), Some("boom"));
        assert_eq!(first_line(" \n "), None);
    }
}
