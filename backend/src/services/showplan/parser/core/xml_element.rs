//! In-memory XML element tree for ShowPlan documents
//!
//! ShowPlan XML is small enough to be fully materialized, so the reader builds a
//! plain element tree with quick-xml and every later stage (function extraction,
//! operator parsing, missing-index queries) walks that tree.

use crate::services::showplan::parser::error::{ParseError, ParseResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Deepest element nesting accepted by [`XmlElement::parse`]
///
/// Later stages walk the tree recursively, so the limit bounds their stack use.
pub const MAX_ELEMENT_DEPTH: usize = 1024;

/// One XML element with its attributes in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Local element name (namespace prefix stripped)
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: Option<String>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Set or overwrite an attribute, keeping its original position
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// XML schema booleans accept `true`/`false` and `1`/`0`
    pub fn attr_bool(&self, name: &str) -> bool {
        self.attr(name).map(parse_xml_bool).unwrap_or(false)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn attr_i64(&self, name: &str) -> Option<i64> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a chain of child element names
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |current, name| current.child(name))
    }

    /// Pre-order traversal of this element and everything beneath it
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All descendants (including self) with the given name
    pub fn descendants_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |e| e.name == name)
    }

    fn check_depth(open: usize, position: u64) -> ParseResult<()> {
        if open >= MAX_ELEMENT_DEPTH {
            return Err(ParseError::InvalidXml(format!(
                "elements nested deeper than {} levels at position {}",
                MAX_ELEMENT_DEPTH, position
            )));
        }
        Ok(())
    }

    /// Parse an XML string into its root element
    pub fn parse(xml: &str) -> ParseResult<XmlElement> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    Self::check_depth(stack.len(), reader.buffer_position())?;
                    stack.push(Self::from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    Self::check_depth(stack.len(), reader.buffer_position())?;
                    let element = Self::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, element);
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| {
                        ParseError::InvalidXml("unbalanced closing tag".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element);
                }
                Ok(Event::Text(t)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = t
                            .unescape()
                            .map_err(|e| ParseError::InvalidXml(e.to_string()))?;
                        Self::append_text(top, &text);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&c).into_owned();
                        Self::append_text(top, &text);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ParseError::InvalidXml(format!(
                        "error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::InvalidXml(format!(
                "unexpected end of document inside <{}>",
                stack.last().map(|e| e.name.as_str()).unwrap_or_default()
            )));
        }

        root.ok_or_else(|| ParseError::UnrecognizedPlanSource("document has no root element".to_string()))
    }

    /// Serialize this element as a standalone UTF-8 XML document
    pub fn to_xml_string(&self) -> ParseResult<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| ParseError::XmlWrite(e.to_string()))?;
        Self::write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| ParseError::XmlWrite(e.to_string()))
    }

    fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> ParseResult<()> {
        let mut start = BytesStart::new(element.name.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.children.is_empty() && element.text.is_none() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| ParseError::XmlWrite(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| ParseError::XmlWrite(e.to_string()))?;
        if let Some(text) = &element.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| ParseError::XmlWrite(e.to_string()))?;
        }
        for child in &element.children {
            Self::write_element(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.name.as_str())))
            .map_err(|e| ParseError::XmlWrite(e.to_string()))
    }

    fn from_start(start: &BytesStart<'_>) -> ParseResult<XmlElement> {
        let name = std::str::from_utf8(start.local_name().as_ref())
            .map_err(|e| ParseError::InvalidXml(e.to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::InvalidXml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::InvalidXml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(XmlElement { name, attributes, children: Vec::new(), text: None })
    }

    fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }

    fn append_text(element: &mut XmlElement, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        match &mut element.text {
            Some(existing) => existing.push_str(text),
            None => element.text = Some(text.to_string()),
        }
    }
}

/// Parse an XML schema boolean
pub fn parse_xml_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "True" | "TRUE")
}

/// Pre-order iterator over an element subtree
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack.extend(current.children.iter().rev());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let xml = r#"<?xml version="1.0" encoding="utf-16"?>
<ShowPlanXML xmlns="http://schemas.microsoft.com/sqlserver/2004/07/showplan" Version="1.6">
  <BatchSequence><Batch><Statements>
    <StmtSimple StatementText="SELECT 1 &lt; 2" StatementId="1" />
  </Statements></Batch></BatchSequence>
</ShowPlanXML>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "ShowPlanXML");
        assert_eq!(root.attr("Version"), Some("1.6"));

        let stmt = root
            .find_path(&["BatchSequence", "Batch", "Statements", "StmtSimple"])
            .unwrap();
        assert_eq!(stmt.attr("StatementText"), Some("SELECT 1 < 2"));
        assert_eq!(stmt.attr_i64("StatementId"), Some(1));
    }

    #[test]
    fn test_prefixed_elements_use_local_name() {
        let xml = r#"<p:ShowPlanXML xmlns:p="urn:x"><p:BatchSequence/></p:ShowPlanXML>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "ShowPlanXML");
        assert_eq!(root.children[0].name, "BatchSequence");
    }

    #[test]
    fn test_unbalanced_document_is_rejected() {
        let result = XmlElement::parse("<ShowPlanXML><BatchSequence>");
        assert!(matches!(result, Err(ParseError::InvalidXml(_))));
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let depth = 5000;
        let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let result = XmlElement::parse(&xml);
        assert!(matches!(result, Err(ParseError::InvalidXml(msg)) if msg.contains("nested deeper")));
    }

    #[test]
    fn test_nesting_at_the_limit_is_accepted() {
        let xml = format!(
            "{}{}",
            "<a>".repeat(MAX_ELEMENT_DEPTH - 1),
            "<a/>".to_string() + &"</a>".repeat(MAX_ELEMENT_DEPTH - 1)
        );
        let root = XmlElement::parse(&xml).unwrap();
        assert_eq!(root.descendants().count(), MAX_ELEMENT_DEPTH);
    }

    #[test]
    fn test_empty_document_is_unrecognized() {
        let result = XmlElement::parse("   ");
        assert!(matches!(result, Err(ParseError::UnrecognizedPlanSource(_))));
    }

    #[test]
    fn test_write_and_reparse_preserves_structure() {
        let element = XmlElement::new("RelOp")
            .with_attr("NodeId", "0")
            .with_attr("PhysicalOp", "Filter")
            .with_child(
                XmlElement::new("Predicate")
                    .with_child(XmlElement::new("ScalarOperator").with_attr("ScalarString", "[a]>(1) & \"x\"")),
            );

        let xml = element.to_xml_string().unwrap();
        assert!(xml.starts_with("<?xml"));

        let reparsed = XmlElement::parse(&xml).unwrap();
        assert_eq!(reparsed, element);
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let element = XmlElement::new("a")
            .with_child(XmlElement::new("b").with_child(XmlElement::new("c")))
            .with_child(XmlElement::new("d"));
        let names: Vec<&str> = element.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_attr_bool_accepts_schema_forms() {
        let element = XmlElement::new("x").with_attr("A", "1").with_attr("B", "false");
        assert!(element.attr_bool("A"));
        assert!(!element.attr_bool("B"));
        assert!(!element.attr_bool("Missing"));
    }
}
