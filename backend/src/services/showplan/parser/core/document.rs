//! ShowPlan document and plan source decoding

use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::{ParseError, ParseResult};
use crate::services::showplan::parser::specialized::record_set::ShowPlanRow;

pub const SHOWPLAN_ROOT: &str = "ShowPlanXML";

/// Statement element names defined by the ShowPlan schema
pub const STATEMENT_ELEMENTS: &[&str] = &[
    "StmtSimple",
    "StmtCond",
    "StmtCursor",
    "StmtReceive",
    "StmtUseDb",
    "ExternalDistributedComputation",
];

/// Leading bytes of a SQL Server binary XML token stream
const BINARY_XML_SIGNATURE: [u8; 2] = [0xDF, 0xFF];

/// The shapes a plan payload can arrive in
#[derive(Debug, Clone)]
pub enum PlanSource {
    /// An already parsed document
    Document(ShowPlanDocument),
    /// ShowPlan XML text
    Xml(String),
    /// Raw bytes of an XML column (UTF-8 or UTF-16 with BOM)
    Bytes(Vec<u8>),
    /// Rows of a legacy `SET SHOWPLAN_ALL` / `SET STATISTICS PROFILE` result
    RecordSet(Vec<ShowPlanRow>),
}

/// A parsed `ShowPlanXML` document
#[derive(Debug, Clone, PartialEq)]
pub struct ShowPlanDocument {
    root: XmlElement,
}

impl ShowPlanDocument {
    pub fn parse(xml: &str) -> ParseResult<Self> {
        let trimmed = xml.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            return Err(ParseError::UnrecognizedPlanSource("plan payload is empty".to_string()));
        }
        Self::from_element(XmlElement::parse(trimmed)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        let text = decode_plan_bytes(bytes)?;
        Self::parse(&text)
    }

    pub fn from_element(root: XmlElement) -> ParseResult<Self> {
        if root.name != SHOWPLAN_ROOT {
            return Err(ParseError::UnrecognizedPlanSource(format!(
                "expected <{}> root element, found <{}>",
                SHOWPLAN_ROOT, root.name
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// `BatchSequence/Batch` elements in document order
    pub fn batches(&self) -> Vec<&XmlElement> {
        self.root
            .children_named("BatchSequence")
            .flat_map(|seq| seq.children_named("Batch"))
            .collect()
    }

    /// Statements of one batch, cloned so preprocessing can restructure them
    pub fn batch_statements(batch: &XmlElement) -> Vec<XmlElement> {
        batch
            .children_named("Statements")
            .flat_map(|s| s.children.iter())
            .filter(|s| is_statement(s))
            .cloned()
            .collect()
    }

    /// Total number of top-level statements before any preprocessing
    pub fn statement_count(&self) -> usize {
        self.batches()
            .iter()
            .map(|b| Self::batch_statements(b).len())
            .sum()
    }

    /// Build a minimal document holding only `statement`
    ///
    /// The `ShowPlanXML` attributes (namespace, version, build) are kept so the
    /// result is a valid plan on its own.
    pub fn single_statement(&self, statement: &XmlElement) -> ShowPlanDocument {
        let mut root = XmlElement::new(SHOWPLAN_ROOT);
        root.attributes = self.root.attributes.clone();
        let statements = XmlElement::new("Statements").with_child(statement.clone());
        let batch = XmlElement::new("Batch").with_child(statements);
        root.children.push(XmlElement::new("BatchSequence").with_child(batch));
        ShowPlanDocument { root }
    }

    pub fn to_xml(&self) -> ParseResult<String> {
        self.root.to_xml_string()
    }
}

pub fn is_statement(element: &XmlElement) -> bool {
    STATEMENT_ELEMENTS.contains(&element.name.as_str())
}

/// Decode the bytes of an XML column into text
///
/// Handles UTF-8 (with or without BOM) and UTF-16 with a byte-order mark. The
/// binary XML token stream used by older servers has no public decoder here and
/// is rejected with a message telling the caller how to get a text plan.
pub fn decode_plan_bytes(bytes: &[u8]) -> ParseResult<String> {
    if bytes.is_empty() {
        return Err(ParseError::UnrecognizedPlanSource("plan payload is empty".to_string()));
    }
    if bytes.starts_with(&BINARY_XML_SIGNATURE) {
        return Err(ParseError::UnrecognizedPlanSource(
            "binary XML plans are not supported; request the plan as XML text \
             (SET STATISTICS XML ON or SET SHOWPLAN_XML ON)"
                .to_string(),
        ));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return utf8(rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16(rest, u16::from_be_bytes);
    }
    // UTF-16LE without BOM: "<" followed by a zero byte
    if bytes.len() >= 2 && bytes[0] == b'<' && bytes[1] == 0 {
        return utf16(bytes, u16::from_le_bytes);
    }
    utf8(bytes)
}

fn utf8(bytes: &[u8]) -> ParseResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ParseError::UnrecognizedPlanSource(format!("payload is not UTF-8 text: {}", e)))
}

fn utf16(bytes: &[u8], decode: fn([u8; 2]) -> u16) -> ParseResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(ParseError::UnrecognizedPlanSource(
            "UTF-16 payload has an odd number of bytes".to_string(),
        ));
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| decode([c[0], c[1]])).collect();
    String::from_utf16(&units)
        .map_err(|e| ParseError::UnrecognizedPlanSource(format!("payload is not UTF-16 text: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STATEMENTS: &str = r#"<ShowPlanXML xmlns="http://schemas.microsoft.com/sqlserver/2004/07/showplan" Version="1.564" Build="16.0.1000.6">
  <BatchSequence>
    <Batch><Statements>
      <StmtSimple StatementText="SELECT 1" StatementId="1" StatementType="SELECT" />
    </Statements></Batch>
    <Batch><Statements>
      <StmtSimple StatementText="SELECT 2" StatementId="2" StatementType="SELECT" />
    </Statements></Batch>
  </BatchSequence>
</ShowPlanXML>"#;

    #[test]
    fn test_batches_and_statements() {
        let doc = ShowPlanDocument::parse(TWO_STATEMENTS).unwrap();
        assert_eq!(doc.batches().len(), 2);
        assert_eq!(doc.statement_count(), 2);
    }

    #[test]
    fn test_wrong_root_is_unrecognized() {
        let result = ShowPlanDocument::parse("<Profile><Summary/></Profile>");
        assert!(matches!(result, Err(ParseError::UnrecognizedPlanSource(_))));
    }

    #[test]
    fn test_single_statement_keeps_root_attributes() {
        let doc = ShowPlanDocument::parse(TWO_STATEMENTS).unwrap();
        let second = ShowPlanDocument::batch_statements(doc.batches()[1]).remove(0);
        let single = doc.single_statement(&second);

        assert_eq!(single.root().attr("Build"), Some("16.0.1000.6"));
        assert_eq!(single.statement_count(), 1);

        let xml = single.to_xml().unwrap();
        let reparsed = ShowPlanDocument::parse(&xml).unwrap();
        assert_eq!(reparsed, single);
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<ShowPlanXML/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = ShowPlanDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.root().name, "ShowPlanXML");
    }

    #[test]
    fn test_binary_xml_is_rejected_with_guidance() {
        let err = decode_plan_bytes(&[0xDF, 0xFF, 0x01, 0xB0, 0x04]).unwrap_err();
        match err {
            ParseError::UnrecognizedPlanSource(msg) => assert!(msg.contains("SHOWPLAN_XML")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
