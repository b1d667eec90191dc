// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting a combined JUnit document into one file per suite.

use crate::{
    errors::{ConvertError, DocumentKind, IoError, IoOperation},
    naming::SuiteFileNamer,
    transform::{decode, parse},
};
use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use roxmltree::{Node, NodeType};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Read, Write},
};
use tracing::debug;

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static NAME_ATTR: &str = "name";
static XML_PREFIX: &str = "xml";
static XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Writes every `<testsuite>` of a combined document to its own file.
#[derive(Clone, Debug, Default)]
pub struct SuiteSplitter {
    namer: SuiteFileNamer,
}

impl SuiteSplitter {
    /// Creates a new splitter that names files with `namer`.
    pub fn new(namer: SuiteFileNamer) -> Self {
        Self { namer }
    }

    /// Returns the namer used by this splitter.
    pub fn namer(&self) -> &SuiteFileNamer {
        &self.namer
    }

    /// Splits the combined document read from `input` into `output_dir`, which must exist.
    ///
    /// Suites are the direct `<testsuite>` children of the first `<testsuites>` element, written
    /// in document order. A document without a `<testsuites>` element, or without suites,
    /// produces no files. The first failure aborts the split; files written before it are left in
    /// place.
    pub fn split(
        &self,
        mut input: impl Read,
        output_dir: &Utf8Path,
    ) -> Result<SplitSummary, ConvertError> {
        let mut bytes = Vec::new();
        input
            .read_to_end(&mut bytes)
            .map_err(|error| IoError::new(IoOperation::ReadIntermediate, error))?;
        let text = decode(&bytes, DocumentKind::Combined)?;
        let document = parse(text, DocumentKind::Combined)?;

        let mut summary = SplitSummary::default();
        let Some(container) = document
            .root()
            .descendants()
            .find(|node| is_named(*node, TESTSUITES_TAG))
        else {
            return Ok(summary);
        };

        for suite in container
            .children()
            .filter(|node| is_named(*node, TESTSUITE_TAG))
        {
            let suite_name = suite.attribute(NAME_ATTR).unwrap_or_default();
            let path = output_dir.join(self.namer.file_name(suite_name));
            write_suite_file(suite, &path)?;
            debug!(suite = suite_name, %path, "wrote suite file");
            summary.files.push(SuiteFile {
                suite_name: suite_name.to_owned(),
                path,
            });
        }

        Ok(summary)
    }
}

/// The files written by a split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitSummary {
    files: Vec<SuiteFile>,
}

impl SplitSummary {
    /// Returns one entry per suite, in document order.
    ///
    /// If two suites map to the same path, the path appears twice and the file holds the later
    /// suite.
    pub fn files(&self) -> &[SuiteFile] {
        &self.files
    }

    /// Returns the number of suites written.
    pub fn suite_count(&self) -> usize {
        self.files.len()
    }

    /// Returns paths written by more than one suite, with the names of those suites in document
    /// order.
    pub fn collisions(&self) -> BTreeMap<&Utf8Path, Vec<&str>> {
        let mut by_path: BTreeMap<&Utf8Path, Vec<&str>> = BTreeMap::new();
        for file in &self.files {
            by_path
                .entry(file.path.as_path())
                .or_default()
                .push(file.suite_name.as_str());
        }
        by_path.retain(|_, names| names.len() > 1);
        by_path
    }
}

/// A suite and the file it was written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteFile {
    /// The suite's `name` attribute, empty if absent.
    pub suite_name: String,

    /// The file the suite was written to.
    pub path: Utf8PathBuf,
}

fn is_named(node: Node<'_, '_>, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn write_suite_file(suite: Node<'_, '_>, path: &Utf8Path) -> Result<(), IoError> {
    let file = File::create(path)
        .map_err(|error| IoError::with_path(IoOperation::CreateOutput, path, error))?;
    let mut writer = Writer::new(BufWriter::new(file));
    serialize_suite(suite, &mut writer)
        .map_err(|error| IoError::with_path(IoOperation::WriteOutput, path, error.into_io()))?;
    // Flush explicitly: errors from the implicit flush on drop are swallowed.
    writer
        .into_inner()
        .flush()
        .map_err(|error| IoError::with_path(IoOperation::WriteOutput, path, error))
}

#[derive(Debug)]
enum EmitError {
    Io(io::Error),
    Xml(quick_xml::Error),
}

impl From<io::Error> for EmitError {
    fn from(error: io::Error) -> Self {
        EmitError::Io(error)
    }
}

impl From<quick_xml::Error> for EmitError {
    fn from(error: quick_xml::Error) -> Self {
        EmitError::Xml(error)
    }
}

impl EmitError {
    fn into_io(self) -> io::Error {
        match self {
            EmitError::Io(error) => error,
            EmitError::Xml(error) => io::Error::other(error),
        }
    }
}

/// Serializes `suite` as the root of a standalone document.
fn serialize_suite<W: Write>(
    suite: Node<'_, '_>,
    writer: &mut Writer<W>,
) -> Result<(), EmitError> {
    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;
    writer.get_mut().write_all(b"\n")?;

    serialize_element(suite, true, writer)?;

    // Add a trailing newline.
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

fn serialize_element<W: Write>(
    node: Node<'_, '_>,
    is_root: bool,
    writer: &mut Writer<W>,
) -> Result<(), EmitError> {
    let tag_name = qualified_name(node, node.tag_name().namespace(), node.tag_name().name());

    let mut start = BytesStart::new(tag_name.as_str());
    for (prefix, uri) in namespace_declarations(node, is_root) {
        match prefix {
            Some(prefix) => start.push_attribute((format!("xmlns:{prefix}").as_str(), uri)),
            None => start.push_attribute(("xmlns", uri)),
        }
    }
    for attribute in node.attributes() {
        let name = qualified_name(node, attribute.namespace(), attribute.name());
        start.push_attribute((name.as_str(), attribute.value()));
    }

    if !node.has_children() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => serialize_element(child, false, writer)?,
            NodeType::Text => {
                if let Some(text) = child.text() {
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                }
            }
            NodeType::Comment => {
                if let Some(text) = child.text() {
                    writer.write_event(Event::Comment(BytesText::from_escaped(text)))?;
                }
            }
            // Processing instructions inside suites carry nothing JUnit consumers read.
            NodeType::PI | NodeType::Root => {}
        }
    }
    writer.write_event(Event::End(BytesEnd::new(tag_name.as_str())))?;

    Ok(())
}

fn qualified_name(node: Node<'_, '_>, namespace: Option<&str>, local_name: &str) -> String {
    if namespace == Some(XML_NAMESPACE) {
        return format!("{XML_PREFIX}:{local_name}");
    }
    match namespace.and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local_name}"),
        _ => local_name.to_owned(),
    }
}

/// Returns the namespace declarations `node` needs when serialized.
///
/// The re-rooted suite declares every namespace in scope; descendants only declare namespaces
/// their parent does not have. A descendant that leaves its parent's default namespace gets an
/// `xmlns=""` undeclaration.
fn namespace_declarations<'a>(
    node: Node<'a, '_>,
    is_root: bool,
) -> Vec<(Option<&'a str>, &'a str)> {
    let parent = if is_root { None } else { node.parent_element() };
    let mut declarations: Vec<_> = node
        .namespaces()
        .filter(|ns| ns.name() != Some(XML_PREFIX))
        .filter(|ns| !(is_root && ns.name().is_none() && ns.uri().is_empty()))
        .filter(|ns| {
            parent.is_none_or(|parent| {
                !parent
                    .namespaces()
                    .any(|other| other.name() == ns.name() && other.uri() == ns.uri())
            })
        })
        .map(|ns| (ns.name(), ns.uri()))
        .collect();

    let has_default = |node: Node<'_, '_>| {
        node.namespaces()
            .any(|ns| ns.name().is_none() && !ns.uri().is_empty())
    };
    let leaves_default = parent.is_some_and(|parent| has_default(parent) && !has_default(node));
    if leaves_default && !declarations.iter().any(|(prefix, _)| prefix.is_none()) {
        declarations.insert(0, (None, ""));
    }
    declarations
}
