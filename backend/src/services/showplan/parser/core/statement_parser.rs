//! Statement and query-plan parsers

use crate::services::showplan::models::NodeId;
use crate::services::showplan::parser::core::operator_parser::{NodeBuilderContext, OperatorParser};
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::ParseResult;

/// Child elements of a statement that carry their own nodes
const STATEMENT_CHILDREN: &[&str] = &[
    "QueryPlan",
    "StoredProc",
    "UDF",
    "Condition",
    "Then",
    "Else",
    "CursorPlan",
];

/// `StmtSimple`, `StmtCond`, `StmtCursor`, `StmtReceive`, `StmtUseDb`
///
/// A statement without `StatementType` is a carrier (for example the wrapper
/// produced when a procedure body is hoisted) and adds no node of its own.
pub struct StatementParser;

impl OperatorParser for StatementParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children
            .iter()
            .filter(|c| STATEMENT_CHILDREN.contains(&c.name.as_str()))
            .collect()
    }

    fn current_node(
        &self,
        item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        let Some(statement_type) = item.attr("StatementType") else {
            return Ok(parent_node);
        };

        let operation = ctx.catalog.statement(statement_type.trim());
        let id = ctx.new_node(operation, parent_node);
        if let Some(cost) = item.attr_f64("StatementSubTreeCost") {
            ctx.graph.node_mut(id).set_subtree_cost(cost);
        }
        if let Some(statement_id) = item.attr("StatementId") {
            ctx.graph.node_stmt_map.insert(statement_id.to_string(), id);
        }
        Ok(Some(id))
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        STATEMENT_CHILDREN.contains(&name)
    }
}

/// `QueryPlan` adds plan-wide properties to its statement node
pub struct QueryPlanParser;

impl OperatorParser for QueryPlanParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children_named("RelOp").collect()
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
        // Missing indexes surface through the graph description instead
        matches!(name, "RelOp" | "MissingIndexes")
    }
}
