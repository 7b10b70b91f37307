//! Known ShowPlan field names and their display metadata

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Which direction of change is an improvement when comparing two plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BetterValue {
    None,
    Higher,
    Lower,
    TrueIsBetter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTemplate {
    pub name: &'static str,
    pub display_name: &'static str,
    pub order: i32,
    pub show_in_tooltip: bool,
    pub is_long_string: bool,
    pub better_value: BetterValue,
}

const TIP: u8 = 0b01;
const LONG: u8 = 0b10;

const fn tpl(
    name: &'static str,
    display_name: &'static str,
    order: i32,
    flags: u8,
    better_value: BetterValue,
) -> PropertyTemplate {
    PropertyTemplate {
        name,
        display_name,
        order,
        show_in_tooltip: flags & TIP != 0,
        is_long_string: flags & LONG != 0,
        better_value,
    }
}

use self::BetterValue::{Higher, Lower, None as Neutral, TrueIsBetter};

static TEMPLATES: &[PropertyTemplate] = &[
    // Operator identity
    tpl("PhysicalOp", "Physical Operation", 0, TIP, Neutral),
    tpl("LogicalOp", "Logical Operation", 1, TIP, Neutral),
    tpl("ActualExecutionMode", "Actual Execution Mode", 2, TIP, Neutral),
    tpl("EstimatedExecutionMode", "Estimated Execution Mode", 3, TIP, Neutral),
    tpl("Storage", "Storage", 4, TIP, Neutral),
    tpl("StorageType", "Storage", 4, TIP, Neutral),
    // Actual run-time figures
    tpl("ActualRowsRead", "Number of Rows Read", 10, TIP, Lower),
    tpl("ActualRows", "Actual Number of Rows for All Executions", 11, TIP, Neutral),
    tpl("ActualBatches", "Actual Number of Batches", 12, TIP, Neutral),
    tpl("ActualEndOfScans", "Actual End Of Scans", 13, 0, Neutral),
    tpl("ActualLocallyAggregatedRows", "Actual Number of Locally Aggregated Rows", 14, 0, Neutral),
    tpl("ActualRebinds", "Actual Rebinds", 15, 0, Lower),
    tpl("ActualRewinds", "Actual Rewinds", 16, 0, Lower),
    tpl("ActualExecutions", "Number of Executions", 17, TIP, Lower),
    tpl("ActualTimeStatistics", "Actual Time Statistics", 18, 0, Neutral),
    tpl("ActualElapsedms", "Actual Elapsed Time (ms)", 19, 0, Lower),
    tpl("ActualCPUms", "Actual Elapsed CPU Time (ms)", 20, 0, Lower),
    tpl("ActualIOStatistics", "Actual I/O Statistics", 21, 0, Neutral),
    tpl("ActualScans", "Actual Scans", 22, 0, Lower),
    tpl("ActualLogicalReads", "Actual Logical Reads", 23, 0, Lower),
    tpl("ActualPhysicalReads", "Actual Physical Reads", 24, 0, Lower),
    tpl("ActualPageServerReads", "Actual Page Server Reads", 25, 0, Lower),
    tpl("ActualReadAheads", "Actual Read Aheads", 26, 0, Lower),
    tpl("ActualPageServerReadAheads", "Actual Page Server Read Aheads", 27, 0, Lower),
    tpl("ActualLobLogicalReads", "Actual Lob Logical Reads", 28, 0, Lower),
    tpl("ActualLobPhysicalReads", "Actual Lob Physical Reads", 29, 0, Lower),
    tpl("ActualLobPageServerReads", "Actual Lob Page Server Reads", 30, 0, Lower),
    tpl("ActualLobReadAheads", "Actual Lob Read Aheads", 31, 0, Lower),
    tpl("ActualLobPageServerReadAheads", "Actual Lob Page Server Read Aheads", 32, 0, Lower),
    tpl("SegmentReads", "Segment Reads", 33, 0, Lower),
    tpl("SegmentSkips", "Segment Skips", 34, 0, Higher),
    tpl("ActualMemoryGrantStats", "Actual Memory Grant Stats", 35, 0, Neutral),
    tpl("InputMemoryGrant", "Input Memory Grant", 36, 0, Neutral),
    tpl("OutputMemoryGrant", "Output Memory Grant", 37, 0, Neutral),
    tpl("UsedMemoryGrant", "Used Memory Grant", 38, 0, Lower),
    tpl("HpcRowCount", "Hpc Row Count", 39, 0, Neutral),
    tpl("HpcKernelElapsedUs", "Hpc Kernel Elapsed (us)", 40, 0, Lower),
    tpl("HpcHostToDeviceBytes", "Hpc Host To Device Bytes", 41, 0, Lower),
    tpl("HpcDeviceToHostBytes", "Hpc Device To Host Bytes", 42, 0, Lower),
    tpl("PartitionCount", "Actual Partition Count", 43, TIP, Lower),
    tpl("PartitionsAccessed", "Actual Partitions Accessed", 44, TIP, Neutral),
    // Estimates
    tpl("EstimateIO", "Estimated I/O Cost", 50, TIP, Lower),
    tpl("EstimateCPU", "Estimated CPU Cost", 51, TIP, Lower),
    tpl("EstimatedTotalSubtreeCost", "Estimated Subtree Cost", 52, TIP, Lower),
    tpl("TotalSubtreeCost", "Estimated Subtree Cost", 52, TIP, Lower),
    tpl("EstimatedOperatorCost", "Estimated Operator Cost", 53, TIP, Lower),
    tpl("EstimateExecutions", "Estimated Number of Executions", 54, TIP, Lower),
    tpl("EstimateRows", "Estimated Number of Rows", 55, TIP, Neutral),
    tpl("EstimatedRowsRead", "Estimated Number of Rows to be Read", 56, TIP, Lower),
    tpl("EstimateRowsWithoutRowGoal", "Estimated Rows Without Row Goal", 57, 0, Neutral),
    tpl("AvgRowSize", "Estimated Row Size", 58, TIP, Lower),
    tpl("EstimateRebinds", "Estimated Number of Rebinds", 59, 0, Lower),
    tpl("EstimateRewinds", "Estimated Number of Rewinds", 60, 0, Lower),
    tpl("TableCardinality", "Table Cardinality", 61, 0, Neutral),
    // Operator flags
    tpl("Parallel", "Parallel", 70, 0, Neutral),
    tpl("Partitioned", "Partitioned", 71, 0, Neutral),
    tpl("Ordered", "Ordered", 72, TIP, Neutral),
    tpl("NodeId", "Node ID", 73, TIP, Neutral),
    tpl("Lookup", "Lookup", 74, 0, Neutral),
    tpl("ScanDirection", "Scan Direction", 75, 0, Neutral),
    tpl("ForcedIndex", "Forced Index", 76, 0, Neutral),
    tpl("ForceSeek", "ForceSeek", 77, 0, Neutral),
    tpl("ForceScan", "ForceScan", 78, 0, Neutral),
    tpl("NoExpandHint", "NoExpandHint", 79, 0, Neutral),
    tpl("IndexKind", "Index Kind", 80, 0, Neutral),
    tpl("Distinct", "Distinct", 81, 0, Neutral),
    tpl("ManyToMany", "Many to Many", 82, 0, Neutral),
    tpl("BitmapCreator", "Bitmap Creator", 83, 0, Neutral),
    tpl("PartitioningType", "Partitioning Type", 84, 0, Neutral),
    tpl("IsAdaptive", "Is Adaptive", 85, TIP, Neutral),
    tpl("AdaptiveThresholdRows", "Adaptive Threshold Rows", 86, TIP, Neutral),
    tpl("EstimatedJoinType", "Estimated Join Type", 87, TIP, Neutral),
    tpl("ActualJoinType", "Actual Join Type", 88, TIP, Neutral),
    tpl("StartupExpression", "Startup Expression", 89, 0, Neutral),
    tpl("IsPercent", "Is Percent", 90, 0, Neutral),
    tpl("WithTies", "With Ties", 91, 0, Neutral),
    tpl("RowCount", "Row Count", 92, 0, Neutral),
    tpl("PrimaryNodeId", "Primary Node ID", 93, 0, Neutral),
    tpl("WithOrderedPrefetch", "With Ordered Prefetch", 94, 0, Neutral),
    tpl("WithUnorderedPrefetch", "With Unordered Prefetch", 95, 0, Neutral),
    tpl("PartitionId", "Partition ID", 96, 0, Neutral),
    tpl("TableValuedFunctionName", "Table Valued Function", 97, 0, Neutral),
    tpl("RemoteSource", "Remote Source", 98, 0, Neutral),
    tpl("RemoteObject", "Remote Object", 99, 0, Neutral),
    // Object identity
    tpl("Database", "Database", 110, 0, Neutral),
    tpl("Schema", "Schema", 111, 0, Neutral),
    tpl("Table", "Table", 112, 0, Neutral),
    tpl("Index", "Index", 113, 0, Neutral),
    tpl("Alias", "Alias", 114, 0, Neutral),
    tpl("Server", "Server", 115, 0, Neutral),
    tpl("Filtered", "Filtered", 116, 0, Neutral),
    tpl("CloneAccessScope", "Clone Access Scope", 117, 0, Neutral),
    tpl("ProcName", "Procedure Name", 118, TIP, Neutral),
    tpl("IsNativelyCompiled", "Is Natively Compiled", 119, 0, Neutral),
    tpl("CursorName", "Cursor Name", 120, TIP, Neutral),
    tpl("CursorActualType", "Cursor Actual Type", 121, TIP, Neutral),
    tpl("CursorRequestedType", "Cursor Requested Type", 122, 0, Neutral),
    tpl("CursorConcurrency", "Cursor Concurrency", 123, 0, Neutral),
    tpl("ForwardOnly", "Forward Only", 124, 0, Neutral),
    tpl("OperationType", "Operation Type", 125, 0, Neutral),
    // Statement level
    tpl("StatementId", "Statement ID", 130, 0, Neutral),
    tpl("StatementCompId", "Statement Compilation ID", 131, 0, Neutral),
    tpl("StatementType", "Statement Type", 132, 0, Neutral),
    tpl("StatementSubTreeCost", "Estimated Subtree Cost", 133, TIP, Lower),
    tpl("StatementEstRows", "Estimated Number of Rows", 134, TIP, Neutral),
    tpl("StatementOptmLevel", "Optimization Level", 135, 0, Neutral),
    tpl("StatementOptmEarlyAbortReason", "Reason For Early Termination Of Statement Optimization", 136, 0, Neutral),
    tpl("StatementParameterizationType", "Statement Parameterization Type", 137, 0, Neutral),
    tpl("QueryHash", "Query Hash", 138, 0, Neutral),
    tpl("QueryPlanHash", "Query Plan Hash", 139, 0, Neutral),
    tpl("CardinalityEstimationModelVersion", "Cardinality Estimation Model Version", 140, 0, Neutral),
    tpl("RetrievedFromCache", "Retrieved From Cache", 141, 0, TrueIsBetter),
    tpl("SecurityPolicyApplied", "Security Policy Applied", 142, 0, Neutral),
    tpl("BatchModeOnRowStoreUsed", "Batch Mode On RowStore Used", 143, 0, Neutral),
    tpl("QueryStoreStatementHintId", "Query Store Statement Hint ID", 144, 0, Neutral),
    tpl("CachedPlanSize", "Cached Plan Size", 145, TIP, Lower),
    tpl("CompileTime", "Compile Time", 146, 0, Lower),
    tpl("CompileCPU", "Compile CPU", 147, 0, Lower),
    tpl("CompileMemory", "Compile Memory", 148, 0, Lower),
    tpl("DegreeOfParallelism", "Degree of Parallelism", 149, TIP, Neutral),
    tpl("EffectiveDegreeOfParallelism", "Effective Degree of Parallelism", 150, 0, Neutral),
    tpl("NonParallelPlanReason", "Non Parallel Plan Reason", 151, 0, Neutral),
    tpl("ContainsInlineScalarTsqlUdfs", "Contains Inline Scalar Tsql Udfs", 152, 0, Neutral),
    tpl("MemoryGrant", "Memory Grant", 153, TIP, Lower),
    tpl("MemoryGrantInfo", "Memory Grant Info", 154, 0, Neutral),
    tpl("SerialRequiredMemory", "Serial Required Memory", 155, 0, Lower),
    tpl("SerialDesiredMemory", "Serial Desired Memory", 156, 0, Lower),
    tpl("RequiredMemory", "Required Memory", 157, 0, Lower),
    tpl("DesiredMemory", "Desired Memory", 158, 0, Lower),
    tpl("RequestedMemory", "Requested Memory", 159, 0, Lower),
    tpl("GrantWaitTime", "Grant Wait Time", 160, 0, Lower),
    tpl("GrantedMemory", "Granted Memory", 161, 0, Lower),
    tpl("MaxUsedMemory", "Max Used Memory", 162, 0, Lower),
    tpl("MaxQueryMemory", "Max Query Memory", 163, 0, Neutral),
    tpl("OptimizerHardwareDependentProperties", "Optimizer Hardware Dependent Properties", 164, 0, Neutral),
    tpl("EstimatedAvailableMemoryGrant", "Estimated Available Memory Grant", 165, 0, Neutral),
    tpl("EstimatedPagesCached", "Estimated Pages Cached", 166, 0, Neutral),
    tpl("EstimatedAvailableDegreeOfParallelism", "Estimated Available Degree Of Parallelism", 167, 0, Neutral),
    tpl("MaxCompileMemory", "Max Compile Memory", 168, 0, Neutral),
    tpl("QueryTimeStats", "QueryTimeStats", 169, 0, Neutral),
    tpl("CpuTime", "CPU Time", 170, 0, Lower),
    tpl("ElapsedTime", "Elapsed Time", 171, 0, Lower),
    tpl("UdfCpuTime", "UDF CPU Time", 172, 0, Lower),
    tpl("UdfElapsedTime", "UDF Elapsed Time", 173, 0, Lower),
    tpl("ThreadStat", "Thread Stat", 174, 0, Neutral),
    tpl("Branches", "Branches", 175, 0, Neutral),
    tpl("UsedThreads", "Used Threads", 176, 0, Lower),
    tpl("WaitStats", "Wait Stats", 177, 0, Neutral),
    tpl("OptimizerStatsUsage", "Optimizer Statistics Usage", 178, 0, Neutral),
    tpl("StatementSetOptions", "Set Options", 179, 0, Neutral),
    tpl("ANSI_NULLS", "ANSI_NULLS", 180, 0, Neutral),
    tpl("ANSI_PADDING", "ANSI_PADDING", 181, 0, Neutral),
    tpl("ANSI_WARNINGS", "ANSI_WARNINGS", 182, 0, Neutral),
    tpl("ARITHABORT", "ARITHABORT", 183, 0, Neutral),
    tpl("CONCAT_NULL_YIELDS_NULL", "CONCAT_NULL_YIELDS_NULL", 184, 0, Neutral),
    tpl("NUMERIC_ROUNDABORT", "NUMERIC_ROUNDABORT", 185, 0, Neutral),
    tpl("QUOTED_IDENTIFIER", "QUOTED_IDENTIFIER", 186, 0, Neutral),
    tpl("MemoryFractions", "Memory Fractions", 187, 0, Neutral),
    tpl("Type", "Type", 188, 0, Neutral),
    // Warnings
    tpl("NoJoinPredicate", "No Join Predicate", 190, TIP, Neutral),
    tpl("SpillToTempDb", "Spill To TempDb", 191, 0, Neutral),
    tpl("SpillOccurred", "Spill Occurred", 192, 0, Neutral),
    tpl("ColumnsWithNoStatistics", "Columns With No Statistics", 193, 0, Neutral),
    tpl("MemoryGrantWarning", "Memory Grant Warning", 194, 0, Neutral),
    tpl("PlanAffectingConvert", "Plan Affecting Convert", 195, 0, Neutral),
    tpl("UnmatchedIndexes", "Unmatched Indexes", 196, 0, Neutral),
    tpl("FullUpdateForOnlineIndexBuild", "Full Update For Online Index Build", 197, 0, Neutral),
    // Long strings: ordered among themselves, always after the short values
    tpl("StatementText", "Statement", 200, TIP | LONG, Neutral),
    tpl("StmtText", "Statement", 200, TIP | LONG, Neutral),
    tpl("Object", "Object", 201, TIP | LONG, Neutral),
    tpl("Predicate", "Predicate", 202, TIP | LONG, Neutral),
    tpl("StartupExpressionPredicate", "Startup Expression Predicate", 202, TIP | LONG, Neutral),
    tpl("SeekPredicates", "Seek Predicates", 203, TIP | LONG, Neutral),
    tpl("OutputList", "Output List", 204, TIP | LONG, Neutral),
    tpl("DefinedValues", "Defined Values", 205, LONG, Neutral),
    tpl("OrderBy", "Order By", 206, TIP | LONG, Neutral),
    tpl("GroupBy", "Group By", 207, TIP | LONG, Neutral),
    tpl("HashKeysBuild", "Hash Keys Build", 208, TIP | LONG, Neutral),
    tpl("HashKeysProbe", "Hash Keys Probe", 209, TIP | LONG, Neutral),
    tpl("BuildResidual", "Build Residual", 210, LONG, Neutral),
    tpl("ProbeResidual", "Probe Residual", 211, TIP | LONG, Neutral),
    tpl("Residual", "Residual", 212, TIP | LONG, Neutral),
    tpl("PassThru", "Pass Through", 213, LONG, Neutral),
    tpl("OuterReferences", "Outer References", 214, TIP | LONG, Neutral),
    tpl("WhereJoinColumns", "Where (join columns)", 215, TIP | LONG, Neutral),
    tpl("PartitionColumns", "Partition Columns", 216, TIP | LONG, Neutral),
    tpl("TopExpression", "Top Expression", 217, LONG, Neutral),
    tpl("SetPredicate", "Set Predicate", 218, LONG, Neutral),
    tpl("RemoteQuery", "Remote Query", 219, TIP | LONG, Neutral),
    tpl("ParameterList", "Parameter List", 220, LONG, Neutral),
    tpl("Argument", "Argument", 221, TIP | LONG, Neutral),
    tpl("Warnings", "Warnings", 222, TIP | LONG, Neutral),
];

static TEMPLATE_INDEX: Lazy<HashMap<&'static str, &'static PropertyTemplate>> =
    Lazy::new(|| TEMPLATES.iter().map(|t| (t.name, t)).collect());

/// Look up the template for a ShowPlan field name
pub fn find(name: &str) -> Option<&'static PropertyTemplate> {
    TEMPLATE_INDEX.get(name).copied()
}

pub fn all() -> &'static [PropertyTemplate] {
    TEMPLATES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_template_names_are_unique() {
        let mut seen = HashSet::new();
        for template in all() {
            assert!(seen.insert(template.name), "duplicate template {}", template.name);
        }
    }

    #[test]
    fn test_find() {
        let template = find("EstimatedTotalSubtreeCost").unwrap();
        assert_eq!(template.display_name, "Estimated Subtree Cost");
        assert_eq!(template.better_value, BetterValue::Lower);
        assert!(find("NotAShowPlanField").is_none());
    }

    #[test]
    fn test_long_string_flags() {
        assert!(find("OutputList").unwrap().is_long_string);
        assert!(!find("PhysicalOp").unwrap().is_long_string);
    }
}
