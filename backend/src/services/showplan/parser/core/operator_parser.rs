//! Operator parser trait and the per-element registry
//!
//! Each ShowPlan element kind that matters for the graph has one parser. A
//! parser decides which node the element contributes to (a fresh node or the
//! parent's), fills that node's properties, and names the child elements the
//! tree builder should descend into.

use std::collections::HashMap;

use crate::services::showplan::catalog::{Operation, OperatorCatalog};
use crate::services::showplan::models::{NodeId, ShowPlanGraph};
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::ParseResult;
use crate::services::showplan::properties::PropertyBag;
use crate::services::showplan::properties::converter::{add_attributes, add_children};

use super::document::STATEMENT_ELEMENTS;
use super::control_flow_parser::{
    ConditionParser, CursorOperationParser, CursorPlanParser, FunctionParser, ThenElseParser,
};
use super::relop_parser::{FilterParser, MergeParser, RelOpBaseParser, RelOpParser};
use super::statement_parser::{QueryPlanParser, StatementParser};

/// Mutable state for building one statement's graph
pub struct NodeBuilderContext<'a> {
    pub graph: ShowPlanGraph,
    pub catalog: &'a OperatorCatalog,
}

impl<'a> NodeBuilderContext<'a> {
    pub fn new(catalog: &'a OperatorCatalog) -> Self {
        Self { graph: ShowPlanGraph::new(), catalog }
    }

    /// Allocate a node and hang it under `parent` when there is one
    pub fn new_node(&mut self, operation: Operation, parent: Option<NodeId>) -> NodeId {
        let id = self.graph.add_node(operation);
        if let Some(parent) = parent {
            self.graph.add_child(parent, id);
        }
        id
    }

    pub fn into_graph(self) -> ShowPlanGraph {
        self.graph
    }
}

pub trait OperatorParser: Send + Sync {
    /// Child elements to recurse into
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement>;

    /// Node this element contributes to; `None` only when there is nothing to attach to
    fn current_node(
        &self,
        item: &XmlElement,
        parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>>;

    /// Properties contributed by this element
    ///
    /// Every attribute becomes a property and every child element that is
    /// neither skipped nor recursed into is converted into one.
    fn parse_properties(&self, item: &XmlElement, bag: &mut PropertyBag) {
        add_attributes(item, bag, |name| self.should_skip_property(item, name));
        add_children(item, bag, |name| self.should_skip_property(item, name));
    }

    fn should_skip_property(&self, _item: &XmlElement, _name: &str) -> bool {
        false
    }
}

/// Element name to parser, built once per builder
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Box<dyn OperatorParser>>,
    relop_base: RelOpBaseParser,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut parsers: HashMap<&'static str, Box<dyn OperatorParser>> = HashMap::new();
        for &name in STATEMENT_ELEMENTS {
            parsers.insert(name, Box::new(StatementParser));
        }
        parsers.insert("QueryPlan", Box::new(QueryPlanParser));
        parsers.insert("RelOp", Box::new(RelOpParser));
        parsers.insert("Filter", Box::new(FilterParser));
        parsers.insert("Merge", Box::new(MergeParser));
        parsers.insert("Condition", Box::new(ConditionParser));
        parsers.insert("Then", Box::new(ThenElseParser));
        parsers.insert("Else", Box::new(ThenElseParser));
        parsers.insert("CursorPlan", Box::new(CursorPlanParser));
        parsers.insert("Operation", Box::new(CursorOperationParser));
        parsers.insert("StoredProc", Box::new(FunctionParser));
        parsers.insert("UDF", Box::new(FunctionParser));

        Self { parsers, relop_base: RelOpBaseParser }
    }

    /// Parser for `item`, or `None` when the element is not part of the graph
    ///
    /// Operator-specific elements directly under a `RelOp` without a dedicated
    /// parser are handled by the pass-through base parser.
    pub fn parser_for(&self, item: &XmlElement, parent_item: Option<&XmlElement>) -> Option<&dyn OperatorParser> {
        let parent_name = parent_item.map(|p| p.name.as_str());
        let under_relop = parent_name == Some("RelOp");
        match self.parsers.get(item.name.as_str()) {
            Some(_) if !Self::in_expected_parent(&item.name, parent_name) => None,
            Some(parser) => Some(parser.as_ref()),
            None if under_relop => Some(&self.relop_base as &dyn OperatorParser),
            None => None,
        }
    }

    /// `Merge`, `Filter` and `Operation` are generic names outside their operator context
    fn in_expected_parent(name: &str, parent_name: Option<&str>) -> bool {
        match name {
            "Merge" | "Filter" => parent_name == Some("RelOp"),
            "Operation" => parent_name == Some("CursorPlan"),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dispatch() {
        let registry = ParserRegistry::new();
        let relop = XmlElement::new("RelOp");
        let stmt = XmlElement::new("StmtSimple");
        let scan = XmlElement::new("IndexScan");

        assert!(registry.parser_for(&stmt, None).is_some());
        assert!(registry.parser_for(&scan, Some(&relop)).is_some());
        assert!(registry.parser_for(&scan, Some(&stmt)).is_none());
        assert!(registry.parser_for(&XmlElement::new("Filter"), Some(&stmt)).is_none());
        assert!(registry.parser_for(&XmlElement::new("Unknown"), None).is_none());
    }
}
