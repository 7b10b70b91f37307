//! Plan builder: payload in, one graph per statement out

use std::sync::Arc;

use crate::services::showplan::catalog::OperatorCatalog;
use crate::services::showplan::models::ShowPlanGraph;
use crate::services::showplan::parser::core::document::{PlanSource, ShowPlanDocument};
use crate::services::showplan::parser::core::operator_parser::ParserRegistry;
use crate::services::showplan::parser::core::tree_builder::TreeBuilder;
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::{ParseError, ParseResult};
use crate::services::showplan::parser::specialized::{
    build_record_set_graphs, describe_statement, extract_functions, flatten_condition_clauses,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Live query statistics: IF/ELSE branches are shown as separate statements
    pub live: bool,
    /// Keep building the remaining statements when one fails
    pub isolate_statement_failures: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { live: false, isolate_statement_failures: true }
    }
}

/// A statement that could not be built
#[derive(Debug, Clone, PartialEq)]
pub struct StatementFailure {
    pub statement_index: usize,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub graphs: Vec<ShowPlanGraph>,
    pub errors: Vec<StatementFailure>,
}

pub struct ShowPlanBuilder {
    catalog: Arc<OperatorCatalog>,
    registry: ParserRegistry,
}

impl ShowPlanBuilder {
    pub fn new(catalog: Arc<OperatorCatalog>) -> Self {
        Self { catalog, registry: ParserRegistry::new() }
    }

    pub fn catalog(&self) -> &OperatorCatalog {
        &self.catalog
    }

    /// Build every statement of the payload
    pub fn build(&self, source: PlanSource, options: &BuildOptions) -> ParseResult<BuildOutput> {
        let results = self.statement_results(source, options)?;
        let total = results.len();

        let mut output = BuildOutput::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(graph) => output.graphs.push(graph),
                Err(error) if options.isolate_statement_failures => {
                    tracing::warn!("Statement {} could not be built: {}", index, error);
                    output.errors.push(StatementFailure { statement_index: index, error });
                }
                Err(error) => return Err(error),
            }
        }

        tracing::debug!(
            "Built {} of {} statements ({} failed)",
            output.graphs.len(),
            total,
            output.errors.len()
        );
        Ok(output)
    }

    /// Build only the statement at `index`, counted after preprocessing
    pub fn build_statement(&self, source: PlanSource, options: &BuildOptions, index: usize) -> ParseResult<ShowPlanGraph> {
        let document = match source {
            PlanSource::RecordSet(rows) => {
                let mut results = build_record_set_graphs(&rows, &self.catalog)?;
                let count = results.len();
                if index >= count {
                    return Err(ParseError::StatementIndexOutOfRange { index, count });
                }
                return results.swap_remove(index);
            }
            other => Self::document(other)?,
        };

        let statements = Self::prepared_statements(&document, options);
        let statement = statements
            .get(index)
            .ok_or(ParseError::StatementIndexOutOfRange { index, count: statements.len() })?;
        self.build_one(&document, statement, index)
    }

    /// One result per statement in payload order
    fn statement_results(
        &self,
        source: PlanSource,
        options: &BuildOptions,
    ) -> ParseResult<Vec<ParseResult<ShowPlanGraph>>> {
        let document = match source {
            PlanSource::RecordSet(rows) => return build_record_set_graphs(&rows, &self.catalog),
            other => Self::document(other)?,
        };

        Ok(Self::prepared_statements(&document, options)
            .iter()
            .enumerate()
            .map(|(index, statement)| self.build_one(&document, statement, index))
            .collect())
    }

    fn document(source: PlanSource) -> ParseResult<ShowPlanDocument> {
        match source {
            PlanSource::Document(document) => Ok(document),
            PlanSource::Xml(xml) => ShowPlanDocument::parse(&xml),
            PlanSource::Bytes(bytes) => ShowPlanDocument::from_bytes(&bytes),
            PlanSource::RecordSet(_) => Err(ParseError::UnrecognizedPlanSource(
                "record set rows do not form an XML document".to_string(),
            )),
        }
    }

    /// Statements of every batch after function extraction and, for live
    /// plans, condition flattening
    fn prepared_statements(document: &ShowPlanDocument, options: &BuildOptions) -> Vec<XmlElement> {
        document
            .batches()
            .into_iter()
            .flat_map(|batch| {
                let statements = extract_functions(ShowPlanDocument::batch_statements(batch));
                if options.live { flatten_condition_clauses(statements) } else { statements }
            })
            .collect()
    }

    fn build_one(&self, document: &ShowPlanDocument, statement: &XmlElement, index: usize) -> ParseResult<ShowPlanGraph> {
        let mut graph = TreeBuilder::new(&self.registry).build_statement(statement, &self.catalog)?;
        if graph.node_count() == 0 {
            return Err(ParseError::MissingAttribute {
                element: statement.name.clone(),
                attribute: "StatementType".to_string(),
            });
        }
        graph.statement_xml = document.single_statement(statement).to_xml()?;
        graph.description = describe_statement(statement);

        tracing::debug!("Statement {} built with {} nodes", index, graph.node_count());
        Ok(graph)
    }
}
