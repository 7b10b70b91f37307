//! Depth-first descent through a statement's XML, driving the operator parsers

use crate::services::showplan::catalog::OperatorCatalog;
use crate::services::showplan::models::{NodeId, ShowPlanGraph};
use crate::services::showplan::parser::core::operator_parser::{NodeBuilderContext, ParserRegistry};
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::ParseResult;

pub struct TreeBuilder<'r> {
    registry: &'r ParserRegistry,
}

impl<'r> TreeBuilder<'r> {
    pub fn new(registry: &'r ParserRegistry) -> Self {
        Self { registry }
    }

    /// Build the node tree for one statement element
    ///
    /// Costs and edge statistics are finalized before returning.
    pub fn build_statement(&self, statement: &XmlElement, catalog: &OperatorCatalog) -> ParseResult<ShowPlanGraph> {
        let mut ctx = NodeBuilderContext::new(catalog);
        self.visit(statement, None, None, &mut ctx)?;
        let mut graph = ctx.into_graph();
        graph.finalize();
        Ok(graph)
    }

    fn visit(
        &self,
        item: &XmlElement,
        parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<()> {
        let Some(parser) = self.registry.parser_for(item, parent_item) else {
            return Ok(());
        };

        let node = parser.current_node(item, parent_item, parent_node, ctx)?;
        if let Some(id) = node {
            parser.parse_properties(item, &mut ctx.graph.node_mut(id).properties);
        }

        for child in parser.children(item) {
            self.visit(child, Some(item), node, ctx)?;
        }
        Ok(())
    }
}
