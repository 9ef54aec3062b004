//! Text Front End - builds trees from XML text
//!
//! Tokenizes with `xmlparser` and drives a [`TinyBuilder`]:
//! - Namespace declarations are resolved with a scoped resolver
//! - Entity and character references are decoded
//! - DTD attribute-list declarations mark ID/IDREF attributes and supply
//!   defaults
//! - Well-formedness errors the tokenizer leaves to its caller (mismatched
//!   or unclosed tags, duplicate attributes, unbound prefixes) are reported
//!   as [`TreeError`]s

pub mod dtd;
pub mod entities;

use crate::config::{Configuration, TreeFamily};
use crate::error::{TreeError, TreeResult};
use crate::names::{self, NameCode, NamespaceBinding, NamespaceResolver};
use crate::tree::{properties, TinyBuilder, TinyTree};
use crate::types::{XS_UNTYPED, XS_UNTYPED_ATOMIC};
use dtd::DtdDeclarations;
use memchr::memchr_iter;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::trace;
use xmlparser::{ElementEnd, EntityDefinition, Token, Tokenizer};

/// Deepest level a node can sit at
const MAX_DEPTH: u16 = u16::MAX;

/// Parse a complete document into a new tree
pub fn parse_str(config: Arc<Configuration>, text: &str) -> TreeResult<TinyTree> {
    let mut builder = TinyBuilder::new(config);
    parse_into(&mut builder, text)?;
    Ok(builder.close())
}

/// Parse a document whose nodes report `system_id`
pub fn parse_document(config: Arc<Configuration>, text: &str, system_id: &str) -> TreeResult<TinyTree> {
    let mut builder = TinyBuilder::new(config);
    builder.set_system_id(system_id);
    parse_into(&mut builder, text)?;
    Ok(builder.close())
}

/// Parse a temporary tree: sized from, and reported to, the temporary family
pub fn parse_temporary(config: Arc<Configuration>, text: &str) -> TreeResult<TinyTree> {
    let mut builder = TinyBuilder::with_family(config, TreeFamily::Temporary);
    parse_into(&mut builder, text)?;
    Ok(builder.close())
}

/// Append one document node, and everything under it, to `builder`.
///
/// Calling this repeatedly on one builder produces a forest.
pub fn parse_into(builder: &mut TinyBuilder, text: &str) -> TreeResult<()> {
    DocumentParser::new(builder, text).run()
}

/// Byte offsets of line starts, for turning positions into line/column
#[derive(Debug)]
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|p| p + 1));
        LineIndex { starts }
    }

    /// 1-based line and column (in characters) of a byte offset
    fn locate(&self, text: &str, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&s| s <= offset);
        let start = self.starts[line - 1];
        let column = text[start..offset].chars().count() + 1;
        (line as u32, column as u32)
    }
}

#[derive(Debug)]
struct RawAttribute<'a> {
    prefix: &'a str,
    local: &'a str,
    value: &'a str,
}

/// A start tag whose attributes are still arriving
#[derive(Debug)]
struct PendingElement<'a> {
    prefix: &'a str,
    local: &'a str,
    position: usize,
    attributes: Vec<RawAttribute<'a>>,
}

fn qname<'a>(prefix: &str, local: &'a str) -> Cow<'a, str> {
    if prefix.is_empty() {
        Cow::Borrowed(local)
    } else {
        Cow::Owned(format!("{prefix}:{local}"))
    }
}

struct DocumentParser<'a, 'b> {
    builder: &'b mut TinyBuilder,
    text: &'a str,
    lines: Option<LineIndex>,
    resolver: NamespaceResolver,
    dtd: DtdDeclarations,
    dtd_start: Option<usize>,
    pending: Option<PendingElement<'a>>,
    open: Vec<(&'a str, &'a str)>,
    text_buffer: String,
    text_position: usize,
}

impl<'a, 'b> DocumentParser<'a, 'b> {
    fn new(builder: &'b mut TinyBuilder, text: &'a str) -> Self {
        let lines = builder
            .tree()
            .config()
            .line_numbering()
            .then(|| LineIndex::new(text));
        DocumentParser {
            builder,
            text,
            lines,
            resolver: NamespaceResolver::new(),
            dtd: DtdDeclarations::new(),
            dtd_start: None,
            pending: None,
            open: Vec::new(),
            text_buffer: String::new(),
            text_position: 0,
        }
    }

    fn run(mut self) -> TreeResult<()> {
        self.builder.start_document();
        let result = self.parse();
        if result.is_err() {
            self.abandon();
        }
        result
    }

    /// Close whatever the failed document left open, so the builder can
    /// take the next document
    fn abandon(&mut self) {
        self.pending = None;
        self.text_buffer.clear();
        while !self.open.is_empty() {
            self.end_element();
        }
        self.builder.end_document();
    }

    fn parse(&mut self) -> TreeResult<()> {
        for token in Tokenizer::from(self.text) {
            match token? {
                Token::Declaration { .. } | Token::EmptyDtd { .. } => {}
                Token::DtdStart { span, .. } => self.dtd_start = Some(span.end()),
                Token::EntityDeclaration {
                    name,
                    definition: EntityDefinition::EntityValue(value),
                    ..
                } => self.dtd.add_entity(name.as_str(), value.as_str()),
                Token::EntityDeclaration { .. } => {}
                Token::DtdEnd { span } => {
                    if let Some(start) = self.dtd_start.take() {
                        self.dtd.add_declarations(&self.text[start..span.start()]);
                    }
                }
                Token::ElementStart { prefix, local, span } => {
                    self.flush_text();
                    self.pending = Some(PendingElement {
                        prefix: prefix.as_str(),
                        local: local.as_str(),
                        position: span.start(),
                        attributes: Vec::new(),
                    });
                }
                Token::Attribute {
                    prefix, local, value, ..
                } => {
                    if let Some(element) = &mut self.pending {
                        element.attributes.push(RawAttribute {
                            prefix: prefix.as_str(),
                            local: local.as_str(),
                            value: value.as_str(),
                        });
                    }
                }
                Token::ElementEnd { end, .. } => match end {
                    ElementEnd::Open => self.start_element()?,
                    ElementEnd::Empty => {
                        self.start_element()?;
                        self.end_element();
                    }
                    ElementEnd::Close(prefix, local) => {
                        self.flush_text();
                        self.close_element(prefix.as_str(), local.as_str())?;
                    }
                },
                Token::Text { text } => {
                    let decoded =
                        entities::normalize_newlines(&entities::decode(text.as_str(), self.dtd.entities()))
                            .into_owned();
                    self.push_text(&decoded, text.start());
                }
                Token::Cdata { text, span } => {
                    let content = entities::normalize_newlines(text.as_str()).into_owned();
                    self.push_text(&content, span.start());
                }
                Token::Comment { text, span } => {
                    self.flush_text();
                    self.set_location(span.start());
                    self.builder.comment(&entities::normalize_newlines(text.as_str()));
                }
                Token::ProcessingInstruction {
                    target,
                    content,
                    span,
                } => {
                    self.flush_text();
                    self.set_location(span.start());
                    let data = content.map_or("", |c| c.as_str());
                    self.builder
                        .processing_instruction(target.as_str(), &entities::normalize_newlines(data));
                }
            }
        }
        if let Some(&(prefix, local)) = self.open.last() {
            return Err(TreeError::UnclosedTag(qname(prefix, local).into_owned()));
        }
        self.builder.end_document();
        Ok(())
    }

    fn set_location(&mut self, offset: usize) {
        if let Some(lines) = &self.lines {
            let (line, column) = lines.locate(self.text, offset);
            self.builder.set_location(line, column);
        }
    }

    /// Buffer character data until the text node is complete. Text outside
    /// the document element is dropped.
    fn push_text(&mut self, text: &str, position: usize) {
        if self.open.is_empty() {
            return;
        }
        if self.text_buffer.is_empty() {
            self.text_position = position;
        }
        self.text_buffer.push_str(text);
    }

    fn flush_text(&mut self) {
        if self.text_buffer.is_empty() {
            return;
        }
        self.set_location(self.text_position);
        self.builder
            .characters(&self.text_buffer, properties::WHOLE_TEXT_NODE);
        self.text_buffer.clear();
    }

    fn resolve(&self, prefix: &str) -> TreeResult<String> {
        self.resolver
            .resolve(prefix)
            .map(str::to_string)
            .ok_or_else(|| TreeError::UnboundPrefix(prefix.to_string()))
    }

    fn start_element(&mut self) -> TreeResult<()> {
        let Some(element) = self.pending.take() else {
            return Ok(());
        };
        if self.builder.current_depth() == MAX_DEPTH {
            return Err(TreeError::NestingTooDeep(MAX_DEPTH));
        }
        self.resolver.push_scope();

        let mut declared = Vec::new();
        for att in &element.attributes {
            let prefix = match (att.prefix, att.local) {
                ("", "xmlns") => "",
                ("xmlns", prefix) => prefix,
                _ => continue,
            };
            let uri = entities::decode(att.value, self.dtd.entities());
            let binding = NamespaceBinding::new(prefix, &uri);
            if self.resolver.declare(binding.clone()) {
                declared.push(binding);
            }
        }

        let element_name = qname(element.prefix, element.local);
        let uri = self.resolve(element.prefix)?;
        let pool = self.builder.tree().names();
        let name_code = pool.allocate(element.prefix, &uri, element.local);

        let mut attributes: Vec<(NameCode, String, u32)> = Vec::new();
        let mut seen: Vec<Cow<'a, str>> = Vec::new();
        for att in &element.attributes {
            if att.prefix == "xmlns" || (att.prefix.is_empty() && att.local == "xmlns") {
                continue;
            }
            let name = qname(att.prefix, att.local);
            let uri = if att.prefix.is_empty() {
                String::new()
            } else {
                self.resolve(att.prefix)?
            };
            let code = self.builder.tree().names().allocate(att.prefix, &uri, att.local);
            if attributes
                .iter()
                .any(|(c, _, _)| names::fingerprint(*c) == names::fingerprint(code))
            {
                return Err(TreeError::DuplicateAttribute(name.into_owned()));
            }
            let normalized = entities::normalize_attribute(att.value);
            let value = entities::decode(&normalized, self.dtd.entities()).into_owned();
            let props = self
                .dtd
                .attribute(&element_name, &name)
                .map_or(0, |def| def.att_type.properties());
            attributes.push((code, value, props));
            seen.push(name);
        }

        for def in self.dtd.attributes(&element_name) {
            let Some(default) = def.default.value() else {
                continue;
            };
            if seen.iter().any(|n| *n == def.name) {
                continue;
            }
            let (prefix, local) = def.name.split_once(':').unwrap_or(("", &def.name));
            if prefix == "xmlns" || def.name == "xmlns" {
                continue;
            }
            let uri = if prefix.is_empty() {
                String::new()
            } else {
                self.resolve(prefix)?
            };
            let code = self.builder.tree().names().allocate(prefix, &uri, local);
            let value = entities::decode(default, self.dtd.entities()).into_owned();
            trace!(attribute = %def.name, "defaulted from DTD");
            attributes.push((code, value, def.att_type.properties()));
        }

        self.set_location(element.position);
        self.builder.start_element(name_code, XS_UNTYPED, 0);
        for binding in declared {
            self.builder.namespace(binding);
        }
        for (code, value, props) in &attributes {
            self.builder.attribute(*code, XS_UNTYPED_ATOMIC, value, *props);
        }
        self.builder.start_content();
        self.open.push((element.prefix, element.local));
        Ok(())
    }

    fn end_element(&mut self) {
        self.open.pop();
        self.builder.end_element();
        self.resolver.pop_scope();
    }

    fn close_element(&mut self, prefix: &str, local: &str) -> TreeResult<()> {
        match self.open.last() {
            Some(&(p, l)) if p == prefix && l == local => {
                self.end_element();
                Ok(())
            }
            Some(&(p, l)) => Err(TreeError::MismatchedEndTag {
                expected: qname(p, l).into_owned(),
                found: qname(prefix, local).into_owned(),
            }),
            None => Err(TreeError::MismatchedEndTag {
                expected: String::new(),
                found: qname(prefix, local).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::ns;
    use crate::tree::{NodeKind, NodeView};

    fn parse(xml: &str) -> TinyTree {
        parse_str(Arc::new(Configuration::new()), xml).unwrap()
    }

    fn parse_err(xml: &str) -> TreeError {
        parse_str(Arc::new(Configuration::new()), xml).unwrap_err()
    }

    #[test]
    fn test_simple_document() {
        let tree = parse("<?xml version='1.0'?><doc><a x='1'>hi</a><b/></doc>");
        let doc = tree.node(0);
        assert_eq!(doc.kind(), NodeKind::Document);
        let root = doc.first_child().unwrap();
        assert_eq!(root.display_name().as_deref(), Some("doc"));
        let names: Vec<String> = root.children().filter_map(|c| c.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let a = root.first_child().unwrap();
        assert_eq!(a.attributes().next().unwrap().string_value(), "1");
        assert_eq!(a.string_value(), "hi");
        assert_eq!(root.string_value(), "hi");
    }

    #[test]
    fn test_namespaces() {
        let tree = parse(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:c p:x="1" y="2"/></r>"#);
        let r = tree.node(1);
        assert_eq!(r.namespace_uri().as_deref(), Some("urn:d"));
        let c = r.first_child().unwrap();
        assert_eq!(c.namespace_uri().as_deref(), Some("urn:p"));
        assert_eq!(c.display_name().as_deref(), Some("p:c"));
        let atts: Vec<String> = c.attributes().map(|a| a.display_name()).collect();
        assert_eq!(atts, vec!["p:x", "y"]);
        assert_eq!(c.declared_namespaces().count(), 0);
        let in_scope = c.in_scope_namespaces();
        assert!(in_scope.iter().any(|b| b.prefix() == "p" && b.uri() == "urn:p"));
        assert!(in_scope.iter().any(|b| b.prefix() == "xml" && b.uri() == ns::XML));
        assert!(tree.uses_namespaces());
    }

    #[test]
    fn test_well_formedness_errors() {
        assert!(matches!(parse_err("<a><b></a>"), TreeError::MismatchedEndTag { .. }));
        assert!(matches!(parse_err("<a><b>"), TreeError::UnclosedTag(name) if name == "b"));
        assert!(matches!(parse_err("<a x='1' x='2'/>"), TreeError::DuplicateAttribute(name) if name == "x"));
        assert!(matches!(parse_err("<q:a/>"), TreeError::UnboundPrefix(p) if p == "q"));
        assert!(parse_str(Arc::new(Configuration::new()), "<a").is_err());
    }

    #[test]
    fn test_duplicate_through_prefixes() {
        let err = parse_err(r#"<a xmlns:p="urn:x" xmlns:q="urn:x" p:v="1" q:v="2"/>"#);
        assert!(matches!(err, TreeError::DuplicateAttribute(name) if name == "q:v"));
    }

    #[test]
    fn test_entities_and_cdata_merge() {
        let tree = parse("<a>x &lt; y<![CDATA[ & <z>]]>&#33;</a>");
        let a = tree.node(1);
        let children: Vec<_> = a.children().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].string_value(), "x < y & <z>!");
    }

    #[test]
    fn test_whitespace_between_elements() {
        let tree = parse("<r>\n  <a/>\n  <b/>\n</r>");
        let kinds: Vec<NodeKind> = (0..tree.node_count() as u32).map(|n| tree.kind(n)).collect();
        assert_eq!(kinds.iter().filter(|k| **k == NodeKind::WhitespaceText).count(), 3);
        assert_eq!(tree.node(1).string_value(), "\n  \n  \n");
        assert!(tree.character_buffer().is_empty());
    }

    #[test]
    fn test_dtd_ids_and_defaults() {
        let xml = r#"<!DOCTYPE doc [
            <!ENTITY co "Acme">
            <!ATTLIST item key ID #IMPLIED ref IDREF #IMPLIED status CDATA "new">
        ]>
        <doc><item key=" k1 ">&co;</item><item ref="k1" status="old"/></doc>"#;
        let tree = parse(xml);
        let item = tree.element_by_id(0, "k1").unwrap();
        assert_eq!(item.string_value(), "Acme");
        assert!(item.attributes().next().unwrap().is_id());
        let second = item.next_sibling().unwrap();
        let atts: Vec<(String, &str)> = second
            .attributes()
            .map(|a| (a.display_name(), a.string_value()))
            .collect();
        assert_eq!(atts, vec![("ref".into(), "k1"), ("status".into(), "old")]);
        assert!(second.attributes().next().unwrap().is_idref());
        let status = item.attributes().find(|a| a.display_name() == "status").unwrap();
        assert_eq!(status.string_value(), "new");
    }

    #[test]
    fn test_xml_id() {
        let tree = parse(r#"<r><e xml:id="e1"/></r>"#);
        let e = tree.element_by_id(0, "e1").unwrap();
        assert_eq!(e.display_name().as_deref(), Some("e"));
    }

    #[test]
    fn test_comments_and_pis_outside_root() {
        let tree = parse("<!--c--><?pi data?><r/><!--after-->");
        let kinds: Vec<NodeKind> = tree.node(0).children().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Comment,
                NodeKind::ProcessingInstruction,
                NodeKind::Element,
                NodeKind::Comment
            ]
        );
        match tree.node(2).materialize() {
            NodeView::ProcessingInstruction { target, data, .. } => {
                assert_eq!(tree.names().display_name(target), "pi");
                assert_eq!(data, "data");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_line_numbers() {
        let config = Configuration::new().with_line_numbering(true);
        let tree = parse_str(Arc::new(config), "<r>\n  <a/>\n    <b/></r>").unwrap();
        let mut elements = tree.node(1).children().filter(|c| c.kind() == NodeKind::Element);
        let a = elements.next().unwrap();
        assert_eq!((a.line_number(), a.column_number()), (Some(2), Some(3)));
        let b = elements.next().unwrap();
        assert_eq!((b.line_number(), b.column_number()), (Some(3), Some(5)));
    }

    #[test]
    fn test_forest_of_parsed_documents() {
        let config = Arc::new(Configuration::new());
        let mut builder = TinyBuilder::new(config);
        builder.set_system_id("one.xml");
        parse_into(&mut builder, "<a id='1'/>").unwrap();
        builder.set_system_id("two.xml");
        parse_into(&mut builder, "<b/>").unwrap();
        let tree = builder.close();
        let roots: Vec<_> = tree.roots().collect();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[1].first_child().unwrap().system_id(), Some("two.xml"));
        assert_eq!(roots[0].first_child().unwrap().system_id(), Some("one.xml"));
    }

    #[test]
    fn test_failed_document_leaves_builder_usable() {
        let config = Arc::new(Configuration::new());
        let mut builder = TinyBuilder::new(config);
        assert!(parse_into(&mut builder, "<a><b></a>").is_err());
        assert_eq!(builder.current_depth(), 0);
        parse_into(&mut builder, "<c/>").unwrap();
        let tree = builder.close();
        let roots: Vec<_> = tree.roots().collect();
        assert_eq!(roots.len(), 2);
        let c = roots[1].first_child().unwrap();
        assert_eq!(c.display_name().as_deref(), Some("c"));
        assert_eq!(c.depth(), 1);
        assert_eq!(c.parent().map(|p| p.nr()), Some(roots[1].nr()));
    }

    #[test]
    fn test_nesting_limit() {
        let xml = "<a>".repeat(MAX_DEPTH as usize + 1);
        let config = Arc::new(Configuration::new());
        let mut builder = TinyBuilder::new(config);
        let err = parse_into(&mut builder, &xml).unwrap_err();
        assert!(matches!(err, TreeError::NestingTooDeep(MAX_DEPTH)));
        assert_eq!(builder.current_depth(), 0);
    }

    #[test]
    fn test_parse_document_system_id() {
        let tree = parse_document(Arc::new(Configuration::new()), "<r/>", "file:///r.xml").unwrap();
        assert_eq!(tree.document_info(0).and_then(|d| d.system_id()), Some("file:///r.xml"));
        assert_eq!(tree.node(1).system_id(), Some("file:///r.xml"));
    }
}
