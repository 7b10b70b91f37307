//! Error types for ShowPlan parsing

use thiserror::Error;

/// Errors raised while turning a ShowPlan payload into graphs.
///
/// Format errors are fatal for the statement being built: the payload is engine
/// output and is expected to be internally consistent, so a malformed element
/// usually means the plan came from a server version this parser does not know.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unrecognized plan source: {0}")]
    UnrecognizedPlanSource(String),

    #[error("Invalid ShowPlan XML: {0}")]
    InvalidXml(String),

    #[error("RelOp {node_id} has neither PhysicalOp nor LogicalOp")]
    MissingOperator { node_id: String },

    #[error("Element <{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Statement index {index} is out of range (batch has {count} statements)")]
    StatementIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid ShowPlan record set: {0}")]
    InvalidRecordSet(String),

    #[error("Failed to write statement XML: {0}")]
    XmlWrite(String),
}

impl ParseError {
    /// Range errors are reported as "not found" rather than as bad input
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::StatementIndexOutOfRange { .. })
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
