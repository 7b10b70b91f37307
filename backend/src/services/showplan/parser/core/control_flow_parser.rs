//! Conditional, cursor and stored-procedure elements

use crate::services::showplan::models::NodeId;
use crate::services::showplan::parser::core::document::is_statement;
use crate::services::showplan::parser::core::operator_parser::{NodeBuilderContext, OperatorParser};
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::{ParseError, ParseResult};
use crate::services::showplan::properties::PropertyBag;

/// Statements listed under `item/Statements`
fn nested_statements(item: &XmlElement) -> Vec<&XmlElement> {
    item.child("Statements")
        .map(|s| s.children.iter().filter(|c| is_statement(c)).collect())
        .unwrap_or_default()
}

/// `StmtCond/Condition`: the predicate's plan hangs off the COND node
pub struct ConditionParser;

impl OperatorParser for ConditionParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children
            .iter()
            .filter(|c| matches!(c.name.as_str(), "QueryPlan" | "UDF"))
            .collect()
    }

    fn current_node(
        &self,
        _item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        _ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        Ok(parent_node)
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        matches!(name, "QueryPlan" | "UDF")
    }
}

/// `StmtCond/Then` and `StmtCond/Else`
pub struct ThenElseParser;

impl OperatorParser for ThenElseParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        nested_statements(item)
    }

    fn current_node(
        &self,
        _item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        _ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        Ok(parent_node)
    }

    // Branch bodies become nodes of their own
    fn parse_properties(&self, _item: &XmlElement, _bag: &mut PropertyBag) {}
}

/// `StmtCursor/CursorPlan`, one node labelled with the cursor type
pub struct CursorPlanParser;

impl OperatorParser for CursorPlanParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children_named("Operation").collect()
    }

    fn current_node(
        &self,
        item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        let cursor_type = item
            .attr("CursorActualType")
            .or_else(|| item.attr("CursorRequestedType"))
            .unwrap_or_default();
        let operation = ctx.catalog.cursor_type(cursor_type);
        Ok(Some(ctx.new_node(operation, parent_node)))
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        name == "Operation"
    }
}

/// `CursorPlan/Operation`: fetch, populate or refresh query
pub struct CursorOperationParser;

impl OperatorParser for CursorOperationParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children_named("QueryPlan").collect()
    }

    fn current_node(
        &self,
        item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        let operation_type = item.attr("OperationType").ok_or_else(|| ParseError::MissingAttribute {
            element: item.name.clone(),
            attribute: "OperationType".to_string(),
        })?;
        let operation = ctx.catalog.physical_operation(operation_type);
        Ok(Some(ctx.new_node(operation, parent_node)))
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        name == "QueryPlan"
    }
}

/// `StoredProc` and `UDF` bodies
pub struct FunctionParser;

impl OperatorParser for FunctionParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        nested_statements(item)
    }

    fn current_node(
        &self,
        item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        let kind = if item.name == "UDF" { "User Defined Function" } else { "Stored Procedure" };
        let operation = ctx.catalog.statement(kind);
        Ok(Some(ctx.new_node(operation, parent_node)))
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        name == "Statements"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::showplan::catalog::OperatorCatalog;

    #[test]
    fn test_cursor_plan_prefers_actual_type() {
        let catalog = OperatorCatalog::new();
        let mut ctx = NodeBuilderContext::new(&catalog);
        let plan = XmlElement::new("CursorPlan")
            .with_attr("CursorName", "c1")
            .with_attr("CursorActualType", "Dynamic")
            .with_attr("CursorRequestedType", "Keyset")
            .with_child(XmlElement::new("Operation").with_attr("OperationType", "FetchQuery"));

        let id = CursorPlanParser.current_node(&plan, None, None, &mut ctx).unwrap().unwrap();
        assert_eq!(ctx.graph.node(id).operation.name, "Dynamic");
        assert_eq!(CursorPlanParser.children(&plan).len(), 1);

        let mut bag = PropertyBag::new();
        CursorPlanParser.parse_properties(&plan, &mut bag);
        assert!(bag.contains("CursorName"));
        assert!(!bag.contains("Operation"));
    }

    #[test]
    fn test_cursor_operation_uses_physical_catalog() {
        let catalog = OperatorCatalog::new();
        let mut ctx = NodeBuilderContext::new(&catalog);
        let op = XmlElement::new("Operation").with_attr("OperationType", "FetchQuery");
        let id = CursorOperationParser.current_node(&op, None, None, &mut ctx).unwrap().unwrap();
        assert_eq!(ctx.graph.node(id).operation.name, "Fetch Query");

        let untyped = XmlElement::new("Operation");
        let err = CursorOperationParser.current_node(&untyped, None, None, &mut ctx).unwrap_err();
        assert!(matches!(err, ParseError::MissingAttribute { .. }));
    }

    #[test]
    fn test_function_children_are_body_statements() {
        let proc = XmlElement::new("StoredProc").with_attr("ProcName", "[dbo].[p]").with_child(
            XmlElement::new("Statements")
                .with_child(XmlElement::new("StmtSimple").with_attr("StatementType", "SELECT"))
                .with_child(XmlElement::new("StmtSimple").with_attr("StatementType", "UPDATE")),
        );
        assert_eq!(FunctionParser.children(&proc).len(), 2);

        let catalog = OperatorCatalog::new();
        let mut ctx = NodeBuilderContext::new(&catalog);
        let id = FunctionParser.current_node(&proc, None, None, &mut ctx).unwrap().unwrap();
        assert_eq!(ctx.graph.node(id).operation.name, "Stored Procedure");

        let mut bag = PropertyBag::new();
        FunctionParser.parse_properties(&proc, &mut bag);
        assert!(bag.contains("ProcName"));
        assert!(!bag.contains("Statements"));
    }

    #[test]
    fn test_condition_is_pass_through() {
        let catalog = OperatorCatalog::new();
        let mut ctx = NodeBuilderContext::new(&catalog);
        let parent = ctx.graph.add_node(catalog.statement("COND"));
        let condition = XmlElement::new("Condition")
            .with_child(XmlElement::new("QueryPlan"))
            .with_child(XmlElement::new("Other"));
        let node = ConditionParser.current_node(&condition, None, Some(parent), &mut ctx).unwrap();
        assert_eq!(node, Some(parent));
        assert_eq!(ConditionParser.children(&condition).len(), 1);
    }
}
