//! End-to-end tests for the ShowPlan engine
//!
//! Fixtures live in `tests/fixtures/showplans/` and were captured from SQL Server
//! 2022 with `SET STATISTICS XML` / `SET SHOWPLAN_XML`, trimmed to the parts the
//! assertions need.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::services::showplan::*;

fn get_fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures/showplans");
    path.push(filename);
    path
}

fn load_plan(filename: &str) -> String {
    let path = get_fixture_path(filename);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", path.display(), e))
}

fn builder() -> ShowPlanBuilder {
    ShowPlanBuilder::new(Arc::new(OperatorCatalog::new()))
}

fn build(filename: &str, options: BuildOptions) -> Vec<ShowPlanGraph> {
    let output = builder()
        .build(PlanSource::Xml(load_plan(filename)), &options)
        .unwrap_or_else(|e| panic!("Failed to build {}: {}", filename, e));
    assert!(output.errors.is_empty(), "unexpected failures: {:?}", output.errors);
    output.graphs
}

fn operation_names(graph: &ShowPlanGraph) -> Vec<String> {
    graph.iter_dfs().map(|n| n.operation.name.clone()).collect()
}

// ========================================================================
// Estimated plans
// ========================================================================

mod estimated_plan_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_graph_per_statement() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        assert_eq!(graphs.len(), 2);
        assert_eq!(
            operation_names(&graphs[0]),
            vec!["SELECT", "Nested Loops", "Index Seek", "Key Lookup"]
        );
        assert_eq!(
            operation_names(&graphs[1]),
            vec!["SELECT", "Compute Scalar", "Stream Aggregate", "Clustered Index Scan"]
        );
    }

    #[test]
    fn test_node_ids_restart_per_statement() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        for graph in &graphs {
            let ids: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
            assert_eq!(ids, (0..graph.node_count()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_costs_roll_up() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let graph = &graphs[0];
        let join = graph.find_nodes_by_operation("Nested Loops")[0];

        assert!((join.subtree_cost() - 0.042).abs() < 1e-9);
        assert!((join.cost() - 0.00005).abs() < 1e-9);
        assert!(graph.nodes().iter().all(|n| n.cost() >= 0.0));
        assert_eq!(graph.relative_cost(0), 0.0);

        let total: f64 = graph.nodes().iter().map(|n| graph.relative_cost(n.id)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_lookup_display() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let lookup = graphs[0].find_nodes_by_operation("Key Lookup")[0];

        assert_eq!(lookup.physical_op.as_deref(), Some("Key Lookup"));
        assert_eq!(lookup.display_name(), "Key Lookup\n[Orders].[PK_Orders]");
        assert_eq!(
            lookup.property("PhysicalOp").and_then(|v| v.as_str()),
            Some("Key Lookup")
        );
    }

    #[test]
    fn test_seek_predicate_and_output_list() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let seek = graphs[0].find_nodes_by_operation("Index Seek")[0];

        let seek_text = seek.property("SeekPredicates").map(|v| v.to_string()).unwrap();
        assert!(seek_text.contains("CustomerId"), "{}", seek_text);
        assert!(seek_text.contains("[@c]"), "{}", seek_text);
        assert_eq!(
            seek.property("OutputList").map(|v| v.to_string()),
            Some("[Sales].[dbo].[Orders] as [o].Id".to_string())
        );
    }

    #[test]
    fn test_edges_carry_estimates() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let graph = &graphs[0];
        let lookup = graph.find_nodes_by_operation("Key Lookup")[0];
        let edge = graph.parent_edge(lookup.id).unwrap();

        assert!(!edge.is_actual);
        // EstimateRows 1 x (11 rebinds + 0 rewinds + 1)
        assert_eq!(edge.row_count, 12.0);
        assert_eq!(edge.row_size, 15.0);
        assert_eq!(graph.row_count_display(lookup.id), "12");
    }

    #[test]
    fn test_missing_index_description() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let description = &graphs[0].description;

        assert_eq!(
            description.query_text,
            "SELECT o.Id, o.Total FROM dbo.Orders o WHERE o.CustomerId = @c"
        );
        assert_eq!(description.missing_indexes.len(), 1);
        let index = &description.missing_indexes[0];
        assert_eq!(
            index.query_text,
            "CREATE NONCLUSTERED INDEX [<Name of Missing Index, sysname,>]\nON [dbo].[Orders] ([CustomerId])\nINCLUDE ([Total])"
        );
        assert!(index.caption.starts_with("Missing Index (Impact 71.2): CREATE NONCLUSTERED INDEX"));
        assert!(!graphs[1].description.has_missing_indexes());
    }

    #[test]
    fn test_missing_indexes_are_not_node_properties() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let root = graphs[0].root().unwrap();
        assert!(root.property("MissingIndexes").is_none());
        assert!(root.property("DegreeOfParallelism").is_some());
        assert!(root.property("QueryPlan").is_none());
    }

    #[test]
    fn test_small_plans_round_display_cost() {
        let graphs = build("simple_select.sqlplan", BuildOptions::default());
        let graph = &graphs[0];
        let lookup = graph.find_nodes_by_operation("Key Lookup")[0];
        assert_eq!(graph.display_cost(lookup.id), "92%");
    }
}

// ========================================================================
// Actual (run-time) plans
// ========================================================================

mod actual_plan_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph() -> ShowPlanGraph {
        build("actual_parallel.sqlplan", BuildOptions::default()).remove(0)
    }

    #[test]
    fn test_gather_streams_uses_logical_operation() {
        let graph = graph();
        let gather = graph.node(graph.root().unwrap().children[0]);
        assert_eq!(gather.operation.name, "Gather Streams");
        assert_eq!(gather.physical_op.as_deref(), Some("Parallelism"));
        assert!(gather.is_parallel());
    }

    #[test]
    fn test_rows_are_summed_across_threads() {
        let graph = graph();
        let hash = graph.find_nodes_by_operation("Hash Match")[0];
        assert_eq!(hash.actual_rows(), Some(1000));
        assert_eq!(graph.row_count_display(hash.id), "1000 of 800 (125%)");

        let edge = graph.parent_edge(hash.id).unwrap();
        assert!(edge.is_actual);
        assert_eq!(edge.row_count, 1000.0);
    }

    #[test]
    fn test_elapsed_time_is_slowest_thread() {
        let graph = graph();
        let hash = graph.find_nodes_by_operation("Hash Match")[0];
        assert_eq!(hash.elapsed_ms(), Some(135));
        assert_eq!(graph.elapsed_time_display(hash.id), Some("0.135s".to_string()));
    }

    #[test]
    fn test_memory_grant_skips_coordinator_thread() {
        let graph = graph();
        let hash = graph.find_nodes_by_operation("Hash Match")[0];
        let stats = hash.property("ActualMemoryGrantStats").and_then(|v| v.as_nested()).unwrap();
        let used = stats.value("UsedMemoryGrant").and_then(|v| v.as_counters()).unwrap();

        assert_eq!(used.num_of_counters(), 3);
        assert_eq!(used.display_value(), 992);
    }

    #[test]
    fn test_spill_is_a_critical_warning() {
        let graph = graph();
        let hash = graph.find_nodes_by_operation("Hash Match")[0];
        assert!(hash.has_warnings());
        assert!(hash.has_critical_warnings());

        let scan = graph.find_nodes_by_operation("Clustered Index Scan")[0];
        assert!(!scan.has_warnings());
    }

    #[test]
    fn test_startup_filter_predicate() {
        let graph = graph();
        let filter = graph.find_nodes_by_operation("Filter")[0];
        assert!(filter.property("Predicate").is_none());

        let renamed = filter.properties.get("StartupExpressionPredicate").unwrap();
        assert_eq!(renamed.display_name_in("en"), "Startup Expression Predicate");
        assert_eq!(renamed.value.as_str(), Some("[@flag]=(1)"));
    }

    #[test]
    fn test_io_statistics_are_grouped() {
        let graph = graph();
        let scans = graph.find_nodes_by_operation("Clustered Index Scan");
        let lines = scans
            .iter()
            .find(|n| n.property("PartitionCount").is_some())
            .unwrap();

        let io = lines.property("ActualIOStatistics").and_then(|v| v.as_nested()).unwrap();
        let reads = io.value("ActualLogicalReads").and_then(|v| v.as_counters()).unwrap();
        assert_eq!(reads.total_counters(), 25);
        assert!(lines.property("ActualLogicalReads").is_none());
        assert_eq!(
            lines.property("PartitionsAccessed").and_then(|v| v.as_str()),
            Some("1, 2..5, 9")
        );
    }

    #[test]
    fn test_graph_view_serializes() {
        let graph = graph();
        let view = GraphView::new(&graph, "en");
        assert_eq!(view.node_count, graph.node_count());
        assert_eq!(view.root, Some(0));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["nodes"][0]["operation"]["name"], "SELECT");
        assert!(json["nodes"][1]["parentEdge"]["isActual"].as_bool().unwrap());
    }
}

// ========================================================================
// Control flow
// ========================================================================

mod control_flow_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_procedure_bodies_are_hoisted() {
        let graphs = build("stored_procedure.sqlplan", BuildOptions::default());
        assert_eq!(graphs.len(), 3);

        assert_eq!(operation_names(&graphs[0]), vec!["EXECUTE PROC"]);
        assert_eq!(
            operation_names(&graphs[1]),
            vec!["Stored Procedure", "SELECT", "Stream Aggregate", "Index Seek", "EXECUTE PROC"]
        );
        assert_eq!(
            operation_names(&graphs[2]),
            vec!["Stored Procedure", "INSERT", "Clustered Index Insert", "Constant Scan"]
        );
        assert_eq!(
            graphs[2].root().unwrap().property("ProcName").and_then(|v| v.as_str()),
            Some("[Sales].[dbo].[usp_Audit]")
        );
    }

    #[test]
    fn test_condition_branches_stay_nested() {
        let graphs = build("if_else.sqlplan", BuildOptions::default());
        assert_eq!(graphs.len(), 1);
        assert_eq!(
            operation_names(&graphs[0]),
            vec![
                "COND",
                "Compute Scalar",
                "Clustered Index Seek",
                "UPDATE",
                "Clustered Index Update",
                "INSERT",
                "Clustered Index Insert",
            ]
        );
    }

    #[test]
    fn test_live_plans_flatten_condition_branches() {
        let options = BuildOptions { live: true, ..BuildOptions::default() };
        let graphs = build("if_else.sqlplan", options);
        assert_eq!(graphs.len(), 3);
        assert_eq!(
            operation_names(&graphs[0]),
            vec!["COND", "Compute Scalar", "Clustered Index Seek"]
        );
        assert_eq!(graphs[1].root().unwrap().operation.name, "UPDATE");
        assert_eq!(graphs[2].root().unwrap().operation.name, "INSERT");
    }

    #[test]
    fn test_cursor_plan() {
        let graphs = build("cursor.sqlplan", BuildOptions::default());
        assert_eq!(
            operation_names(&graphs[0]),
            vec!["DECLARE CURSOR", "Dynamic", "Fetch Query", "Clustered Index Scan"]
        );
        let cursor = graphs[0].find_nodes_by_operation("Dynamic")[0];
        assert_eq!(cursor.property("CursorName").and_then(|v| v.as_str()), Some("c"));
    }
}

// ========================================================================
// Statement extraction
// ========================================================================

mod statement_xml_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_statements_reparse(filename: &str) {
        let b = builder();
        let options = BuildOptions::default();
        let batch = b.build(PlanSource::Xml(load_plan(filename)), &options).unwrap();
        assert!(batch.errors.is_empty(), "{}: {:?}", filename, batch.errors);

        for (index, graph) in batch.graphs.iter().enumerate() {
            let reparsed = b
                .build(PlanSource::Xml(graph.statement_xml.clone()), &options)
                .unwrap();
            assert!(reparsed.errors.is_empty(), "{} #{}: {:?}", filename, index, reparsed.errors);
            assert_eq!(reparsed.graphs.len(), 1, "{} #{}", filename, index);

            let single = &reparsed.graphs[0];
            assert_eq!(single.root().unwrap().display_name(), graph.root().unwrap().display_name());
            assert_eq!(operation_names(single), operation_names(graph));
        }
    }

    #[test]
    fn test_single_statement_reparse_matches_batch() {
        assert_statements_reparse("simple_select.sqlplan");
    }

    #[test]
    fn test_hoisted_procedures_reparse_to_one_graph() {
        assert_statements_reparse("stored_procedure.sqlplan");
    }

    #[test]
    fn test_parsed_document_source() {
        let document = ShowPlanDocument::parse(&load_plan("cursor.sqlplan")).unwrap();
        assert_eq!(document.statement_count(), 1);

        let graph = builder()
            .build_statement(PlanSource::Document(document), &BuildOptions::default(), 0)
            .unwrap();
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_utf16_bytes_source() {
        let xml = load_plan("cursor.sqlplan");
        let mut bytes = vec![0xFF, 0xFE];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let output = builder().build(PlanSource::Bytes(bytes), &BuildOptions::default()).unwrap();
        assert_eq!(output.graphs.len(), 1);
    }

    #[test]
    fn test_out_of_range_statement() {
        let err = builder()
            .build_statement(PlanSource::Xml(load_plan("cursor.sqlplan")), &BuildOptions::default(), 1)
            .unwrap_err();
        assert_eq!(err, ParseError::StatementIndexOutOfRange { index: 1, count: 1 });
    }
}
