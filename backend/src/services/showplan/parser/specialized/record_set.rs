//! Legacy text plans (`SET SHOWPLAN_ALL`, `SET STATISTICS PROFILE`)
//!
//! Each result row is one operator, linked to its parent by `Parent` = `NodeId`.
//! The row whose `Type` is not `PLAN_ROW` is the statement itself.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::services::showplan::catalog::OperatorCatalog;
use crate::services::showplan::counters::RunTimeCounters;
use crate::services::showplan::models::{Description, NodeId, ShowPlanGraph};
use crate::services::showplan::parser::error::{ParseError, ParseResult};
use crate::services::showplan::properties::{PropertyBag, PropertyValue};

const PLAN_ROW: &str = "PLAN_ROW";

/// One row of a legacy showplan result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ShowPlanRow {
    pub stmt_text: String,
    pub stmt_id: i64,
    pub node_id: i64,
    pub parent: i64,
    #[serde(default)]
    pub physical_op: Option<String>,
    #[serde(default)]
    pub logical_op: Option<String>,
    #[serde(default)]
    pub argument: Option<String>,
    #[serde(default)]
    pub defined_values: Option<String>,
    #[serde(default)]
    pub estimate_rows: Option<f64>,
    #[serde(default, rename = "EstimateIO")]
    pub estimate_io: Option<f64>,
    #[serde(default, rename = "EstimateCPU")]
    pub estimate_cpu: Option<f64>,
    #[serde(default)]
    pub avg_row_size: Option<f64>,
    #[serde(default)]
    pub total_subtree_cost: Option<f64>,
    #[serde(default)]
    pub output_list: Option<String>,
    #[serde(default)]
    pub warnings: Option<String>,
    #[serde(rename = "Type")]
    pub row_type: String,
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub estimate_executions: Option<f64>,
    /// Present only for `SET STATISTICS PROFILE`
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default)]
    pub executes: Option<u64>,
}

impl ShowPlanRow {
    pub fn is_plan_row(&self) -> bool {
        self.row_type.trim().eq_ignore_ascii_case(PLAN_ROW)
    }

    fn properties(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        let mut text = |name: &str, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                bag.set(name, PropertyValue::text(v));
            }
        };
        text("PhysicalOp", &self.physical_op);
        text("LogicalOp", &self.logical_op);
        text("Argument", &self.argument);
        text("DefinedValues", &self.defined_values);
        text("OutputList", &self.output_list);
        text("Warnings", &self.warnings);

        let numbers = [
            ("EstimateRows", self.estimate_rows),
            ("EstimateIO", self.estimate_io),
            ("EstimateCPU", self.estimate_cpu),
            ("AvgRowSize", self.avg_row_size),
            ("TotalSubtreeCost", self.total_subtree_cost),
            ("EstimateExecutions", self.estimate_executions),
        ];
        for (name, value) in numbers {
            if let Some(v) = value {
                bag.set(name, PropertyValue::Number(v));
            }
        }
        if let Some(parallel) = self.parallel {
            bag.set("Parallel", PropertyValue::Boolean(parallel));
        }
        for (name, value) in [("ActualRows", self.rows), ("ActualExecutions", self.executes)] {
            if let Some(v) = value {
                let mut counters = RunTimeCounters::total();
                counters.add_counter(0, v);
                bag.set(name, PropertyValue::Counters(counters));
            }
        }
        bag.set("StmtText", PropertyValue::text(self.stmt_text.trim()));
        bag.set("Type", PropertyValue::text(self.row_type.trim()));
        bag
    }
}

/// One graph per `StmtId`, in order of first appearance
///
/// Only an empty record set fails as a whole; every statement carries its own result.
pub fn build_record_set_graphs(
    rows: &[ShowPlanRow],
    catalog: &OperatorCatalog,
) -> ParseResult<Vec<ParseResult<ShowPlanGraph>>> {
    if rows.is_empty() {
        return Err(ParseError::UnrecognizedPlanSource("record set has no rows".to_string()));
    }

    let mut order: Vec<i64> = Vec::new();
    let mut groups: HashMap<i64, Vec<&ShowPlanRow>> = HashMap::new();
    for row in rows {
        groups
            .entry(row.stmt_id)
            .or_insert_with(|| {
                order.push(row.stmt_id);
                Vec::new()
            })
            .push(row);
    }

    Ok(order
        .iter()
        .map(|id| build_statement(*id, &groups[id], catalog))
        .collect())
}

fn build_statement(stmt_id: i64, rows: &[&ShowPlanRow], catalog: &OperatorCatalog) -> ParseResult<ShowPlanGraph> {
    let statement = rows.iter().find(|r| !r.is_plan_row()).ok_or_else(|| {
        ParseError::InvalidRecordSet(format!("statement {} has no statement row", stmt_id))
    })?;
    let plan_rows: Vec<&ShowPlanRow> = rows.iter().copied().filter(|r| r.is_plan_row()).collect();

    let mut graph = ShowPlanGraph::new();
    let root = graph.add_node(catalog.statement(statement.row_type.trim()));
    fill_node(&mut graph, root, statement);
    graph.node_stmt_map.insert(stmt_id.to_string(), root);

    let known: HashSet<i64> = plan_rows.iter().map(|r| r.node_id).collect();
    let mut children: HashMap<i64, Vec<&ShowPlanRow>> = HashMap::new();
    let mut top_level: Vec<&ShowPlanRow> = Vec::new();
    for row in &plan_rows {
        if known.contains(&row.parent) && row.parent != row.node_id {
            children.entry(row.parent).or_default().push(row);
        } else {
            top_level.push(row);
        }
    }

    let mut visited: HashSet<i64> = HashSet::new();
    let mut stack: Vec<(&ShowPlanRow, NodeId)> = top_level.into_iter().rev().map(|r| (r, root)).collect();
    while let Some((row, parent)) = stack.pop() {
        if !visited.insert(row.node_id) {
            return Err(ParseError::InvalidRecordSet(format!(
                "node {} of statement {} appears more than once",
                row.node_id, stmt_id
            )));
        }
        let operation = catalog.physical_operation(row.physical_op.as_deref().unwrap_or_default().trim());
        let id = graph.add_node(operation);
        graph.add_child(parent, id);
        fill_node(&mut graph, id, row);
        if let Some(nested) = children.get(&row.node_id) {
            stack.extend(nested.iter().rev().map(|r| (*r, id)));
        }
    }

    if visited.len() != plan_rows.len() {
        return Err(ParseError::InvalidRecordSet(format!(
            "statement {} has rows that are not reachable from the statement (parent cycle)",
            stmt_id
        )));
    }

    graph.description = Description {
        query_text: statement.stmt_text.trim().to_string(),
        missing_indexes: Vec::new(),
    };
    graph.finalize();
    Ok(graph)
}

fn fill_node(graph: &mut ShowPlanGraph, id: NodeId, row: &ShowPlanRow) {
    let node = graph.node_mut(id);
    node.physical_op = row.physical_op.as_deref().map(str::trim).map(str::to_string);
    node.logical_op = row.logical_op.as_deref().map(str::trim).map(str::to_string);
    if let Some(cost) = row.total_subtree_cost {
        node.set_subtree_cost(cost);
    }
    node.properties = row.properties();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(stmt_id: i64, node_id: i64, parent: i64, op: Option<&str>, kind: &str, cost: f64) -> ShowPlanRow {
        ShowPlanRow {
            stmt_text: "SELECT * FROM T WHERE a = 1".to_string(),
            stmt_id,
            node_id,
            parent,
            physical_op: op.map(str::to_string),
            logical_op: op.map(str::to_string),
            argument: None,
            defined_values: None,
            estimate_rows: Some(10.0),
            estimate_io: None,
            estimate_cpu: None,
            avg_row_size: Some(12.0),
            total_subtree_cost: Some(cost),
            output_list: None,
            warnings: None,
            row_type: kind.to_string(),
            parallel: Some(false),
            estimate_executions: None,
            rows: None,
            executes: None,
        }
    }

    #[test]
    fn test_rows_become_one_graph_per_statement() {
        let rows = vec![
            row(1, 1, 0, None, "SELECT", 0.5),
            row(1, 2, 1, Some("Nested Loops"), PLAN_ROW, 0.5),
            row(1, 3, 2, Some("Index Seek"), PLAN_ROW, 0.2),
            row(1, 4, 2, Some("Clustered Index Scan"), PLAN_ROW, 0.25),
            row(2, 5, 0, None, "SELECT", 0.1),
            row(2, 6, 5, Some("Table Scan"), PLAN_ROW, 0.1),
        ];
        let catalog = OperatorCatalog::new();
        let graphs: Vec<ShowPlanGraph> = build_record_set_graphs(&rows, &catalog)
            .unwrap()
            .into_iter()
            .collect::<ParseResult<_>>()
            .unwrap();

        assert_eq!(graphs.len(), 2);
        let first = &graphs[0];
        assert_eq!(first.node_count(), 4);
        assert_eq!(first.root().unwrap().operation.name, "SELECT");
        let join = first.node(first.root().unwrap().children[0]);
        assert_eq!(join.operation.name, "Nested Loops");
        assert_eq!(join.children.len(), 2);
        assert!((join.cost() - 0.05).abs() < 1e-9);
        assert_eq!(first.description.query_text, "SELECT * FROM T WHERE a = 1");
        assert_eq!(graphs[1].node_count(), 2);
    }

    #[test]
    fn test_statistics_profile_rows_are_actual() {
        let mut scan = row(1, 2, 1, Some("Table Scan"), PLAN_ROW, 0.1);
        scan.rows = Some(42);
        scan.executes = Some(1);
        let rows = vec![row(1, 1, 0, None, "SELECT", 0.1), scan];
        let mut graphs = build_record_set_graphs(&rows, &OperatorCatalog::new()).unwrap();

        let graph = graphs.remove(0).unwrap();
        assert_eq!(graph.node(1).actual_rows(), Some(42));
        let edge = graph.parent_edge(1).unwrap();
        assert!(edge.is_actual);
        assert_eq!(edge.row_count, 42.0);
    }

    #[test]
    fn test_parent_cycle_is_rejected() {
        let rows = vec![
            row(1, 1, 0, None, "SELECT", 0.1),
            row(1, 2, 3, Some("Filter"), PLAN_ROW, 0.1),
            row(1, 3, 2, Some("Table Scan"), PLAN_ROW, 0.1),
        ];
        let results = build_record_set_graphs(&rows, &OperatorCatalog::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ParseError::InvalidRecordSet(_))));
    }

    #[test]
    fn test_missing_statement_row_is_rejected() {
        let rows = vec![row(1, 2, 1, Some("Table Scan"), PLAN_ROW, 0.1)];
        let results = build_record_set_graphs(&rows, &OperatorCatalog::new()).unwrap();
        assert!(matches!(results[0], Err(ParseError::InvalidRecordSet(_))));
    }

    #[test]
    fn test_broken_statement_leaves_others_intact() {
        let rows = vec![
            row(1, 1, 0, None, "SELECT", 0.1),
            row(1, 2, 1, Some("Table Scan"), PLAN_ROW, 0.1),
            row(2, 3, 0, None, "SELECT", 0.1),
            row(2, 4, 5, Some("Filter"), PLAN_ROW, 0.1),
            row(2, 5, 4, Some("Table Scan"), PLAN_ROW, 0.1),
        ];
        let results = build_record_set_graphs(&rows, &OperatorCatalog::new()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().node_count(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_empty_record_set_is_unrecognized() {
        let err = build_record_set_graphs(&[], &OperatorCatalog::new()).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedPlanSource(_)));
    }

    #[test]
    fn test_rows_deserialize_from_pascal_case() {
        let json = r#"{"StmtText":"SELECT 1","StmtId":1,"NodeId":1,"Parent":0,"Type":"SELECT","EstimateIO":0.5}"#;
        let parsed: ShowPlanRow = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.estimate_io, Some(0.5));
        assert!(!parsed.is_plan_row());
    }
}
