//! Plan graph data models
//!
//! One [`ShowPlanGraph`] is built per statement. Nodes live in an arena owned by
//! the graph and refer to each other by index, so the tree can be walked both
//! ways without shared ownership. Costs are derived in [`ShowPlanGraph::finalize`]
//! once the tree is complete: subtree costs bottom-up, then operator costs.

use serde::Serialize;
use std::collections::HashMap;

use crate::services::showplan::catalog::Operation;
use crate::services::showplan::counters::RunTimeCounters;
use crate::services::showplan::properties::{BetterValue, PropertyBag, PropertyValue};

/// Graphs with fewer nodes than this show whole-number percentages
pub const LARGE_PLAN_NODE_COUNT: usize = 20;

pub type NodeId = usize;

// ============================================================================
// Edge
// ============================================================================

/// Data flowing from a child operator into its parent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
    /// Position of the child among its siblings
    pub ordinal: usize,
    pub row_count: f64,
    pub row_size: f64,
    /// Row count comes from run-time counters rather than estimates
    pub is_actual: bool,
}

impl Edge {
    fn new(parent: NodeId, child: NodeId, ordinal: usize) -> Self {
        Self { parent, child, ordinal, row_count: 0.0, row_size: 0.0, is_actual: false }
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub group_index: i32,
    pub properties: PropertyBag,
    pub children: Vec<NodeId>,
    /// Edges to `children`, same order
    pub edges: Vec<Edge>,
    pub parent: Option<NodeId>,
    pub root: NodeId,
    pub operation: Operation,
    /// Unlocalized operator names as found in the plan
    pub physical_op: Option<String>,
    pub logical_op: Option<String>,
    explicit_subtree_cost: Option<f64>,
    subtree_cost: f64,
    cost: f64,
}

impl Node {
    fn new(id: NodeId, root: NodeId, operation: Operation) -> Self {
        Self {
            id,
            group_index: 0,
            properties: PropertyBag::new(),
            children: Vec::new(),
            edges: Vec::new(),
            parent: None,
            root,
            operation,
            physical_op: None,
            logical_op: None,
            explicit_subtree_cost: None,
            subtree_cost: 0.0,
            cost: 0.0,
        }
    }

    /// Property lookup by field name
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.value(name)
    }

    /// Engine-reported subtree cost; children are summed when absent
    pub fn set_subtree_cost(&mut self, cost: f64) {
        self.explicit_subtree_cost = Some(cost);
    }

    pub fn subtree_cost(&self) -> f64 {
        self.subtree_cost
    }

    /// Own cost, never negative
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Physical operator on the first line; object or logical operator on the second
    pub fn display_name(&self) -> String {
        let first = self.operation.display_name.clone();
        let second = self.object_display_name().or_else(|| {
            let logical = self.logical_op.as_deref()?;
            match self.physical_op.as_deref() {
                Some(physical) if physical == logical => None,
                _ if logical == first => None,
                _ => Some(format!("({})", logical)),
            }
        });
        match second {
            Some(second) => format!("{}\n{}", first, second),
            None => first,
        }
    }

    /// `[Table].[Index]` of the first accessed object
    fn object_display_name(&self) -> Option<String> {
        let object = self.object_bag()?;
        let table = object.value("Table").and_then(|v| v.as_str())?;
        match object.value("Index").and_then(|v| v.as_str()) {
            Some(index) => Some(format!("{}.{}", table, index)),
            None => Some(table.to_string()),
        }
    }

    fn object_bag(&self) -> Option<&PropertyBag> {
        match self.property("Object")? {
            PropertyValue::List(items) => items.iter().find_map(|v| v.as_nested()),
            other => other.as_nested(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.property("Parallel").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn has_warnings(&self) -> bool {
        self.property("Warnings").is_some()
    }

    /// Warnings that almost always point at a broken plan
    pub fn has_critical_warnings(&self) -> bool {
        let Some(warnings) = self.property("Warnings").and_then(|v| v.as_nested()) else {
            return false;
        };
        warnings.iter().any(|p| match p.name.as_str() {
            "NoJoinPredicate" => p.value.as_bool().unwrap_or(false),
            "MemoryGrantWarning" => true,
            name => name.contains("Spill"),
        })
    }

    pub fn actual_rows(&self) -> Option<u64> {
        self.counters("ActualRows").map(|c| c.total_counters())
    }

    /// `EstimateRows × (EstimateRebinds + EstimateRewinds + 1)`
    pub fn estimated_rows_all_executions(&self) -> Option<f64> {
        let rows = self.number("EstimateRows")?;
        let rebinds = self.number("EstimateRebinds").unwrap_or(0.0);
        let rewinds = self.number("EstimateRewinds").unwrap_or(0.0);
        Some(rows * (rebinds + rewinds + 1.0))
    }

    /// Longest elapsed time reported by any thread
    pub fn elapsed_ms(&self) -> Option<u64> {
        let stats = self.property("ActualTimeStatistics")?.as_nested()?;
        stats
            .value("ActualElapsedms")
            .and_then(|v| v.as_counters())
            .map(|c| c.max_counter())
    }

    fn counters(&self, name: &str) -> Option<&RunTimeCounters> {
        self.property(name).and_then(|v| v.as_counters())
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(|v| v.as_f64())
    }

    /// Single-node comparison used when diffing plan skeletons
    ///
    /// Logical operators must match, with seeks and scans interchangeable. The
    /// accessed objects must agree on table, index and alias, plus database,
    /// schema and server unless `ignore_database_name` is set.
    pub fn is_logically_equivalent_to(&self, other: &Node, ignore_database_name: bool) -> bool {
        let normalize = |op: Option<&str>| op.map(|s| s.replace("Seek", "Scan"));
        if normalize(self.logical_op.as_deref()) != normalize(other.logical_op.as_deref()) {
            return false;
        }

        match (self.object_bag(), other.object_bag()) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let same = |key: &str| a.value(key) == b.value(key);
                if !["Table", "Index", "Alias"].iter().all(|k| same(*k)) {
                    return false;
                }
                if !ignore_database_name && !["Database", "Schema", "Server"].iter().all(|k| same(*k)) {
                    return false;
                }
                // A clone scope on one side only is a different access path
                a.value("CloneAccessScope") == b.value("CloneAccessScope")
            }
            _ => false,
        }
    }
}

// ============================================================================
// Description
// ============================================================================

/// Server-suggested index for one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingIndex {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub impact: f64,
    pub is_memory_optimized: bool,
    /// CREATE/ALTER statement ready to be edited and run
    pub query_text: String,
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub query_text: String,
    pub missing_indexes: Vec<MissingIndex>,
}

impl Description {
    pub fn has_missing_indexes(&self) -> bool {
        !self.missing_indexes.is_empty()
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ShowPlanGraph {
    nodes: Vec<Node>,
    pub description: Description,
    /// Plan document holding only this statement
    pub statement_xml: String,
    /// StatementId to statement node
    pub node_stmt_map: HashMap<String, NodeId>,
}

impl ShowPlanGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node with the next sequential id; the first node becomes the root
    pub fn add_node(&mut self, operation: Operation) -> NodeId {
        let id = self.nodes.len();
        let root = self.root_id().unwrap_or(id);
        self.nodes.push(Node::new(id, root, operation));
        id
    }

    /// Link `child` under `parent` and create the connecting edge
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let ordinal = self.nodes[parent].children.len();
        let parent_node = &mut self.nodes[parent];
        parent_node.children.push(child);
        parent_node.edges.push(Edge::new(parent, child, ordinal));
        self.nodes[child].parent = Some(parent);
    }

    pub fn root_id(&self) -> Option<NodeId> {
        if self.nodes.is_empty() { None } else { Some(0) }
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent_edge(&self, id: NodeId) -> Option<&Edge> {
        let parent = self.nodes.get(id)?.parent?;
        self.nodes[parent].edges.iter().find(|e| e.child == id)
    }

    /// Derive subtree costs, operator costs and edge statistics
    pub fn finalize(&mut self) {
        let Some(root) = self.root_id() else {
            return;
        };

        for id in self.post_order(root) {
            let children_total: f64 = self.nodes[id]
                .children
                .iter()
                .map(|&c| self.nodes[c].subtree_cost)
                .sum();
            let node = &mut self.nodes[id];
            node.subtree_cost = node.explicit_subtree_cost.unwrap_or(children_total);
        }

        for id in 0..self.nodes.len() {
            let children_total: f64 = self.nodes[id]
                .children
                .iter()
                .map(|&c| self.nodes[c].subtree_cost)
                .sum();
            let node = &mut self.nodes[id];
            // Summation noise can push this slightly below zero
            node.cost = (node.subtree_cost - children_total).max(0.0);
        }

        for id in 0..self.nodes.len() {
            let stats: Vec<(f64, f64, bool)> = self.nodes[id]
                .children
                .iter()
                .map(|&c| {
                    let child = &self.nodes[c];
                    let row_size = child.number("AvgRowSize").unwrap_or(0.0);
                    match child.actual_rows() {
                        Some(actual) => (actual as f64, row_size, true),
                        None => (child.estimated_rows_all_executions().unwrap_or(0.0), row_size, false),
                    }
                })
                .collect();
            for (edge, (row_count, row_size, is_actual)) in self.nodes[id].edges.iter_mut().zip(stats) {
                edge.row_count = row_count;
                edge.row_size = row_size;
                edge.is_actual = is_actual;
            }
        }
    }

    fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.nodes[id].children.iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Share of the whole statement's cost, 0 when the statement costs nothing
    ///
    /// This is the node's own cost over the root's subtree cost. A single-node
    /// plan therefore reports 1, while the root of a multi-node plan reports
    /// only what is left after its children (0 for a statement node that does
    /// no work of its own). Over the whole tree the shares add up to 1.
    pub fn relative_cost(&self, id: NodeId) -> f64 {
        let total = self.root().map(|r| r.subtree_cost).unwrap_or(0.0);
        if total > 0.0 { self.nodes[id].cost / total } else { 0.0 }
    }

    fn rounds_for_display(&self) -> bool {
        self.node_count() < LARGE_PLAN_NODE_COUNT
    }

    pub fn display_cost(&self, id: NodeId) -> String {
        format!("{}%", format_amount(self.relative_cost(id) * 100.0, self.rounds_for_display()))
    }

    /// `actual of estimated (pct%)` for actual plans, the estimate otherwise
    pub fn row_count_display(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        let round = self.rounds_for_display();
        let estimated = node.estimated_rows_all_executions();
        match node.actual_rows() {
            Some(actual) => {
                let estimated = estimated.unwrap_or(0.0);
                if estimated > 0.0 {
                    let pct = actual as f64 / estimated * 100.0;
                    format!(
                        "{} of {} ({}%)",
                        actual,
                        format_amount(estimated, round),
                        format_amount(pct, round)
                    )
                } else {
                    format!("{} of {}", actual, format_amount(estimated, round))
                }
            }
            None => estimated.map(|e| format_amount(e, round)).unwrap_or_default(),
        }
    }

    pub fn elapsed_time_display(&self, id: NodeId) -> Option<String> {
        self.nodes[id]
            .elapsed_ms()
            .map(|ms| format!("{:.3}s", ms as f64 / 1000.0))
    }

    /// Pre-order walk from the root
    pub fn iter_dfs(&self) -> DepthFirst<'_> {
        DepthFirst { graph: self, stack: self.root_id().into_iter().collect() }
    }

    /// Nodes whose physical or logical operator matches `name`
    pub fn find_nodes_by_operation(&self, name: &str) -> Vec<&Node> {
        self.iter_dfs()
            .filter(|n| {
                n.operation.name == name
                    || n.physical_op.as_deref() == Some(name)
                    || n.logical_op.as_deref() == Some(name)
            })
            .collect()
    }
}

fn format_amount(value: f64, round: bool) -> String {
    if round { format!("{:.0}", value) } else { format!("{:.1}", value) }
}

pub struct DepthFirst<'a> {
    graph: &'a ShowPlanGraph,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.graph.node(id);
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

// ============================================================================
// Serializable views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: PropertyValue,
    pub display_value: String,
    pub order: i32,
    pub show_in_tooltip: bool,
    pub is_long_string: bool,
    pub better_value: BetterValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub display_name: String,
    pub display_cost: String,
    pub cost: f64,
    pub subtree_cost: f64,
    pub relative_cost: f64,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_op: Option<String>,
    pub row_count_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time_display: Option<String>,
    pub is_parallel: bool,
    pub has_warnings: bool,
    pub has_critical_warnings: bool,
    pub properties: Vec<PropertyView>,
    pub children: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_edge: Option<Edge>,
}

/// Presentation form of a graph, with property names resolved for one locale
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    pub root: Option<NodeId>,
    pub nodes: Vec<NodeView>,
    pub description: Description,
    pub statement_xml: String,
    pub node_count: usize,
}

impl GraphView {
    pub fn new(graph: &ShowPlanGraph, locale: &str) -> Self {
        let nodes = graph
            .iter_dfs()
            .map(|node| NodeView {
                id: node.id,
                display_name: node.display_name(),
                display_cost: graph.display_cost(node.id),
                cost: node.cost(),
                subtree_cost: node.subtree_cost(),
                relative_cost: graph.relative_cost(node.id),
                operation: node.operation.clone(),
                physical_op: node.physical_op.clone(),
                logical_op: node.logical_op.clone(),
                row_count_display: graph.row_count_display(node.id),
                elapsed_time_display: graph.elapsed_time_display(node.id),
                is_parallel: node.is_parallel(),
                has_warnings: node.has_warnings(),
                has_critical_warnings: node.has_critical_warnings(),
                properties: node
                    .properties
                    .sorted()
                    .into_iter()
                    .map(|p| PropertyView {
                        name: p.name.clone(),
                        display_name: p.display_name_in(locale),
                        description: p.description_in(locale),
                        value: p.value.clone(),
                        display_value: p.value.to_string(),
                        order: p.order,
                        show_in_tooltip: p.show_in_tooltip,
                        is_long_string: p.is_long_string,
                        better_value: p.better_value,
                    })
                    .collect(),
                children: node.children.clone(),
                parent_edge: graph.parent_edge(node.id).cloned(),
            })
            .collect();

        Self {
            root: graph.root_id(),
            nodes,
            description: graph.description.clone(),
            statement_xml: graph.statement_xml.clone(),
            node_count: graph.node_count(),
        }
    }
}
