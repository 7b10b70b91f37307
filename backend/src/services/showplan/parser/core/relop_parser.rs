//! RelOp parser and the operator-specific element parsers
//!
//! A `RelOp` element is one plan operator. Its operator-specific child
//! (`IndexScan`, `Hash`, `NestedLoops`, ...) carries no node of its own: the
//! base parser folds its fields into the RelOp's node and continues into the
//! nested `RelOp` inputs.

use crate::services::showplan::catalog::Operation;
use crate::services::showplan::counters::{CounterDisplay, RunTimeCounters};
use crate::services::showplan::models::NodeId;
use crate::services::showplan::parser::core::operator_parser::{NodeBuilderContext, OperatorParser};
use crate::services::showplan::parser::core::xml_element::XmlElement;
use crate::services::showplan::parser::error::{ParseError, ParseResult};
use crate::services::showplan::properties::converter::{add_attributes, add_children, column_text};
use crate::services::showplan::properties::{PropertyBag, PropertyFactory, PropertyValue};

/// RelOp children that describe the operator itself rather than its inputs
const RELOP_PROPERTY_ELEMENTS: &[&str] = &[
    "OutputList",
    "Warnings",
    "MemoryFractions",
    "RunTimeInformation",
    "RunTimePartitionSummary",
    "InternalInfo",
];

const COLUMNSTORE: &str = "ColumnStore";

/// Physical operators that have a columnstore counterpart
const COLUMNSTORE_OPERATORS: &[(&str, &str)] = &[
    ("Index Scan", "Columnstore Index Scan"),
    ("Clustered Index Scan", "Clustered Columnstore Index Scan"),
    ("Index Insert", "Columnstore Index Insert"),
    ("Clustered Index Insert", "Clustered Columnstore Index Insert"),
    ("Index Update", "Columnstore Index Update"),
    ("Clustered Index Update", "Clustered Columnstore Index Update"),
    ("Index Delete", "Columnstore Index Delete"),
    ("Clustered Index Delete", "Clustered Columnstore Index Delete"),
    ("Index Merge", "Columnstore Index Merge"),
    ("Clustered Index Merge", "Clustered Columnstore Index Merge"),
];

// ============================================================================
// Run-time counters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterGroup {
    Operator,
    Time,
    Io,
    MemoryGrant,
}

impl CounterGroup {
    fn property_name(self) -> Option<&'static str> {
        match self {
            Self::Operator => None,
            Self::Time => Some("ActualTimeStatistics"),
            Self::Io => Some("ActualIOStatistics"),
            Self::MemoryGrant => Some("ActualMemoryGrantStats"),
        }
    }
}

struct CounterSpec {
    attribute: &'static str,
    property: &'static str,
    group: CounterGroup,
    display: CounterDisplay,
}

const fn counter(
    attribute: &'static str,
    property: &'static str,
    group: CounterGroup,
    display: CounterDisplay,
) -> CounterSpec {
    CounterSpec { attribute, property, group, display }
}

const RUNTIME_COUNTERS: &[CounterSpec] = &[
    counter("ActualRows", "ActualRows", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualRowsRead", "ActualRowsRead", CounterGroup::Operator, CounterDisplay::Total),
    counter("Batches", "ActualBatches", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualEndOfScans", "ActualEndOfScans", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualExecutions", "ActualExecutions", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualRebinds", "ActualRebinds", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualRewinds", "ActualRewinds", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualLocallyAggregatedRows", "ActualLocallyAggregatedRows", CounterGroup::Operator, CounterDisplay::Total),
    counter("HpcRowCount", "HpcRowCount", CounterGroup::Operator, CounterDisplay::Total),
    counter("HpcKernelElapsedUs", "HpcKernelElapsedUs", CounterGroup::Operator, CounterDisplay::Max),
    counter("HpcHostToDeviceBytes", "HpcHostToDeviceBytes", CounterGroup::Operator, CounterDisplay::Total),
    counter("HpcDeviceToHostBytes", "HpcDeviceToHostBytes", CounterGroup::Operator, CounterDisplay::Total),
    counter("ActualElapsedms", "ActualElapsedms", CounterGroup::Time, CounterDisplay::Max),
    counter("ActualCPUms", "ActualCPUms", CounterGroup::Time, CounterDisplay::Total),
    counter("ActualScans", "ActualScans", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLogicalReads", "ActualLogicalReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualPhysicalReads", "ActualPhysicalReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualPageServerReads", "ActualPageServerReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualReadAheads", "ActualReadAheads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualPageServerReadAheads", "ActualPageServerReadAheads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLobLogicalReads", "ActualLobLogicalReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLobPhysicalReads", "ActualLobPhysicalReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLobPageServerReads", "ActualLobPageServerReads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLobReadAheads", "ActualLobReadAheads", CounterGroup::Io, CounterDisplay::Total),
    counter("ActualLobPageServerReadAheads", "ActualLobPageServerReadAheads", CounterGroup::Io, CounterDisplay::Total),
    counter("SegmentReads", "SegmentReads", CounterGroup::Io, CounterDisplay::Total),
    counter("SegmentSkips", "SegmentSkips", CounterGroup::Io, CounterDisplay::Total),
    counter("InputMemoryGrant", "InputMemoryGrant", CounterGroup::MemoryGrant, CounterDisplay::MemoryGrant),
    counter("OutputMemoryGrant", "OutputMemoryGrant", CounterGroup::MemoryGrant, CounterDisplay::MemoryGrant),
    counter("UsedMemoryGrant", "UsedMemoryGrant", CounterGroup::MemoryGrant, CounterDisplay::MemoryGrant),
];

/// Fold every `RunTimeCountersPerThread` into per-metric counters
///
/// A metric becomes a property only when at least one thread reported it.
/// Time, I/O and memory-grant metrics are grouped into nested properties.
fn add_runtime_counters(runtime: &XmlElement, bag: &mut PropertyBag) {
    let threads: Vec<&XmlElement> = runtime.children_named("RunTimeCountersPerThread").collect();
    if threads.is_empty() {
        return;
    }

    let mut groups: Vec<(CounterGroup, PropertyBag)> = vec![
        (CounterGroup::Time, PropertyBag::new()),
        (CounterGroup::Io, PropertyBag::new()),
        (CounterGroup::MemoryGrant, PropertyBag::new()),
    ];

    for spec in RUNTIME_COUNTERS {
        let mut counters = RunTimeCounters::new(spec.display);
        for thread in &threads {
            let Some(value) = thread.attr_u64(spec.attribute) else {
                continue;
            };
            let thread_id = thread.attr_u32("Thread").unwrap_or(0);
            match thread.attr_u32("BrickId") {
                Some(brick) => counters.add_brick_counter(thread_id, brick, value),
                None => counters.add_counter(thread_id, value),
            }
        }
        if counters.is_empty() {
            continue;
        }

        let value = PropertyValue::Counters(counters);
        match groups.iter_mut().find(|(g, _)| *g == spec.group) {
            Some((_, group_bag)) => group_bag.set(spec.property, value),
            None => bag.set(spec.property, value),
        }
    }

    if let Some(mode) = threads.iter().find_map(|t| t.attr("ActualExecutionMode")) {
        bag.set("ActualExecutionMode", PropertyValue::text(mode));
    }

    for (group, group_bag) in groups {
        if group_bag.is_empty() {
            continue;
        }
        if let Some(name) = group.property_name() {
            let summary = group_bag
                .iter()
                .map(|p| format!("{}: {}", p.name, p.value))
                .collect::<Vec<_>>()
                .join(", ");
            bag.set(name, PropertyValue::nested(summary, group_bag));
        }
    }
}

/// Render accessed partition ranges: `[(1,1),(2,5),(9,9)]` becomes `1, 2..5, 9`
pub fn format_partition_ranges(ranges: &[(i64, i64)]) -> String {
    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end { start.to_string() } else { format!("{}..{}", start, end) }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn add_partition_summary(summary: &XmlElement, bag: &mut PropertyBag) {
    let Some(accessed) = summary.child("PartitionsAccessed") else {
        return;
    };
    if let Some(count) = accessed.attr_i64("PartitionCount") {
        bag.set("PartitionCount", PropertyValue::Integer(count));
    }
    let ranges: Vec<(i64, i64)> = accessed
        .children_named("PartitionRange")
        .filter_map(|r| Some((r.attr_i64("Start")?, r.attr_i64("End")?)))
        .collect();
    if !ranges.is_empty() {
        bag.set("PartitionsAccessed", PropertyValue::text(format_partition_ranges(&ranges)));
    }
}

// ============================================================================
// RelOp
// ============================================================================

/// Operator names after the Key Lookup and columnstore corrections
#[derive(Debug, Clone, PartialEq, Eq)]
struct OperatorNames {
    physical: Option<String>,
    logical: Option<String>,
}

fn operator_element(relop: &XmlElement) -> Option<&XmlElement> {
    relop
        .children
        .iter()
        .find(|c| !RELOP_PROPERTY_ELEMENTS.contains(&c.name.as_str()))
}

fn resolve_operator_names(relop: &XmlElement) -> OperatorNames {
    let mut physical = relop.attr("PhysicalOp").map(str::to_string);
    let mut logical = relop.attr("LogicalOp").map(str::to_string);
    let op_element = operator_element(relop);

    // Bookmark lookups were reported as clustered index seeks with Lookup="1"
    let is_lookup = op_element.is_some_and(|e| e.attr_bool("Lookup"));
    if is_lookup && physical.as_deref() == Some("Clustered Index Seek") {
        physical = Some("Key Lookup".to_string());
        logical = Some("Key Lookup".to_string());
    }

    if let (Some(name), Some(op)) = (physical.as_deref(), op_element) {
        if let Some(&(_, columnstore)) = COLUMNSTORE_OPERATORS.iter().find(|(from, _)| *from == name) {
            // Scans report storage on themselves, DML on the target object
            let storage = if name.ends_with("Scan") {
                op.attr("Storage")
            } else {
                op.child("Object").and_then(|o| o.attr("Storage"))
            };
            if storage == Some(COLUMNSTORE) {
                physical = Some(columnstore.to_string());
            }
        }
    }

    OperatorNames { physical, logical }
}

/// Physical operation unless the logical one is fully decorated
fn choose_operation(names: &OperatorNames, ctx: &NodeBuilderContext<'_>) -> Operation {
    let physical = names.physical.as_deref().map(|n| ctx.catalog.physical_operation(n));
    let logical = names.logical.as_deref().map(|n| ctx.catalog.logical_operation(n));
    match (physical, logical) {
        (_, Some(logical)) if logical.is_fully_decorated() => logical,
        (Some(physical), _) => physical,
        (None, Some(logical)) => logical,
        (None, None) => ctx.catalog.physical_operation(""),
    }
}

pub struct RelOpParser;

impl OperatorParser for RelOpParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        item.children
            .iter()
            .filter(|c| !RELOP_PROPERTY_ELEMENTS.contains(&c.name.as_str()))
            .collect()
    }

    fn current_node(
        &self,
        item: &XmlElement,
        _parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        let names = resolve_operator_names(item);
        if names.physical.is_none() && names.logical.is_none() {
            return Err(ParseError::MissingOperator {
                node_id: item.attr("NodeId").unwrap_or("?").to_string(),
            });
        }

        let operation = choose_operation(&names, ctx);
        let id = ctx.new_node(operation, parent_node);
        let node = ctx.graph.node_mut(id);
        node.physical_op = names.physical;
        node.logical_op = names.logical;
        if let Some(cost) = item.attr_f64("EstimatedTotalSubtreeCost") {
            node.set_subtree_cost(cost);
        }
        Ok(Some(id))
    }

    fn parse_properties(&self, item: &XmlElement, bag: &mut PropertyBag) {
        add_attributes(item, bag, |_| false);

        let names = resolve_operator_names(item);
        if let Some(physical) = names.physical {
            bag.set("PhysicalOp", PropertyValue::Text(physical));
        }
        if let Some(logical) = names.logical {
            bag.set("LogicalOp", PropertyValue::Text(logical));
        }

        for child in &item.children {
            match child.name.as_str() {
                "RunTimeInformation" => add_runtime_counters(child, bag),
                "RunTimePartitionSummary" => add_partition_summary(child, bag),
                _ => {}
            }
        }
        add_children(item, bag, |name| {
            !RELOP_PROPERTY_ELEMENTS.contains(&name)
                || matches!(name, "RunTimeInformation" | "RunTimePartitionSummary" | "InternalInfo")
        });
    }
}

// ============================================================================
// Operator-specific elements
// ============================================================================

fn nested_relops(item: &XmlElement) -> Vec<&XmlElement> {
    item.children_named("RelOp").collect()
}

/// Pass-through for operator elements without their own visual node
pub struct RelOpBaseParser;

impl OperatorParser for RelOpBaseParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        nested_relops(item)
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
        name == "RelOp"
    }
}

/// `Filter`: a startup filter's predicate is a different kind of predicate
pub struct FilterParser;

impl OperatorParser for FilterParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        nested_relops(item)
    }

    fn current_node(
        &self,
        item: &XmlElement,
        parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        RelOpBaseParser.current_node(item, parent_item, parent_node, ctx)
    }

    fn parse_properties(&self, item: &XmlElement, bag: &mut PropertyBag) {
        RelOpBaseParser.parse_properties(item, bag);
        if item.attr_bool("StartupExpression") {
            if let Some(predicate) = bag.remove("Predicate") {
                bag.insert(PropertyFactory::create("StartupExpressionPredicate", predicate.value));
            }
        }
    }
}

/// `Merge` join: inner and outer join columns are shown as one condition
pub struct MergeParser;

impl OperatorParser for MergeParser {
    fn children<'x>(&self, item: &'x XmlElement) -> Vec<&'x XmlElement> {
        nested_relops(item)
    }

    fn current_node(
        &self,
        item: &XmlElement,
        parent_item: Option<&XmlElement>,
        parent_node: Option<NodeId>,
        ctx: &mut NodeBuilderContext<'_>,
    ) -> ParseResult<Option<NodeId>> {
        RelOpBaseParser.current_node(item, parent_item, parent_node, ctx)
    }

    fn parse_properties(&self, item: &XmlElement, bag: &mut PropertyBag) {
        add_attributes(item, bag, |name| self.should_skip_property(item, name));
        add_children(item, bag, |name| self.should_skip_property(item, name));
        if let Some(where_columns) = where_join_columns(item) {
            bag.set("WhereJoinColumns", PropertyValue::Text(where_columns));
        }
    }

    fn should_skip_property(&self, _item: &XmlElement, name: &str) -> bool {
        matches!(name, "RelOp" | "InnerSideJoinColumns" | "OuterSideJoinColumns")
    }
}

/// `(outer) = (inner)` for each column pair, joined with AND
fn where_join_columns(merge: &XmlElement) -> Option<String> {
    let inner: Vec<String> = merge
        .child("InnerSideJoinColumns")?
        .children_named("ColumnReference")
        .map(column_text)
        .collect();
    let outer: Vec<String> = merge
        .child("OuterSideJoinColumns")?
        .children_named("ColumnReference")
        .map(column_text)
        .collect();
    if inner.is_empty() || inner.len() != outer.len() {
        return None;
    }
    Some(
        outer
            .iter()
            .zip(&inner)
            .map(|(o, i)| format!("({}) = ({})", o, i))
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}
