//! Operator catalog
//!
//! Static metadata for physical operators, logical operators, statement types and
//! cursor types. The catalog is built once by the caller and handed to the plan
//! builder; lookups never fail, an unknown name yields a catch-all operation so
//! plans from newer servers still render.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Splits symbolic enum identifiers such as `ClusteredIndexSeek`
static SYMBOLIC_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]+(?:[a-z0-9]+)?|[a-z0-9]+").unwrap());

/// Display metadata for a named operator, statement or cursor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Operation {
    fn new(name: &str, description: Option<&str>, icon: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.map(str::to_string),
            icon: icon.map(str::to_string),
        }
    }

    /// Logical operators only win over the physical one when fully decorated
    pub fn is_fully_decorated(&self) -> bool {
        self.description.is_some() && self.icon.is_some()
    }
}

/// Which table a lookup goes against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Physical,
    Logical,
    Statement,
    Cursor,
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "physical" => Ok(Self::Physical),
            "logical" => Ok(Self::Logical),
            "statement" => Ok(Self::Statement),
            "cursor" => Ok(Self::Cursor),
            other => Err(format!("unknown operation kind: {}", other)),
        }
    }
}

/// Fallback used when a name is not in its table
#[derive(Debug, Clone, Copy)]
struct CatchAll {
    description: &'static str,
    icon: &'static str,
}

const ITERATOR_CATCH_ALL: CatchAll = CatchAll {
    description: "Operator not recognized by this version of the plan viewer.",
    icon: "iterator_catch_all",
};

const LANGUAGE_CONSTRUCT_CATCH_ALL: CatchAll = CatchAll {
    description: "Statement type not recognized by this version of the plan viewer.",
    icon: "language_construct_catch_all",
};

const CURSOR_CATCH_ALL: CatchAll = CatchAll {
    description: "Cursor type not recognized by this version of the plan viewer.",
    icon: "cursor_catch_all",
};

type Entry = (&'static str, &'static str, &'static str);

const PHYSICAL_OPERATORS: &[Entry] = &[
    ("Adaptive Join", "Chooses dynamically between hash join and nested loops join strategies at run time.", "adaptive_join"),
    ("Assert", "Used to verify that a specified condition exists.", "assert"),
    ("Batch Hash Table Build", "Builds a batch mode hash table.", "batch_hash_table_build"),
    ("Bitmap", "Creates a bitmap used to filter rows early in the plan.", "bitmap"),
    ("Clustered Index Delete", "Removes rows from a clustered index.", "clustered_index_delete"),
    ("Clustered Index Insert", "Inserts rows into a clustered index.", "clustered_index_insert"),
    ("Clustered Index Merge", "Applies inserts, updates and deletes to a clustered index.", "clustered_index_merge"),
    ("Clustered Index Scan", "Scanning a clustered index, entirely or only a range.", "clustered_index_scan"),
    ("Clustered Index Seek", "Scanning a particular range of rows from a clustered index.", "clustered_index_seek"),
    ("Clustered Index Update", "Updates rows in a clustered index.", "clustered_index_update"),
    ("Clustered Columnstore Index Delete", "Removes rows from a clustered columnstore index.", "columnstore_index_delete"),
    ("Clustered Columnstore Index Insert", "Inserts rows into a clustered columnstore index.", "columnstore_index_insert"),
    ("Clustered Columnstore Index Merge", "Applies changes to a clustered columnstore index.", "columnstore_index_merge"),
    ("Clustered Columnstore Index Scan", "Scans a clustered columnstore index.", "columnstore_index_scan"),
    ("Clustered Columnstore Index Update", "Updates rows in a clustered columnstore index.", "columnstore_index_update"),
    ("Collapse", "Optimizes update processing by collapsing delete and insert pairs.", "collapse"),
    ("Columnstore Index Delete", "Removes rows from a nonclustered columnstore index.", "columnstore_index_delete"),
    ("Columnstore Index Insert", "Inserts rows into a nonclustered columnstore index.", "columnstore_index_insert"),
    ("Columnstore Index Merge", "Applies changes to a nonclustered columnstore index.", "columnstore_index_merge"),
    ("Columnstore Index Scan", "Scans a nonclustered columnstore index.", "columnstore_index_scan"),
    ("Columnstore Index Update", "Updates rows in a nonclustered columnstore index.", "columnstore_index_update"),
    ("Compute Scalar", "Compute new values from existing values in a row.", "compute_scalar"),
    ("Concatenation", "Append multiple input tables to form the output table.", "concatenation"),
    ("Constant Scan", "Scan an internal table of constants.", "constant_scan"),
    ("Deleted Scan", "Scans the deleted table within a trigger.", "deleted_scan"),
    ("Filter", "Restricting the set of rows based on a predicate.", "filter"),
    ("Foreign Key References Check", "Checks referential integrity for foreign key references.", "foreign_key_references_check"),
    ("Hash Match", "Use each row from the top input to build a hash table, and each row from the bottom input to probe into the hash table, outputting all matching rows.", "hash_match"),
    ("Index Delete", "Removes rows from a nonclustered index.", "index_delete"),
    ("Index Insert", "Inserts rows into a nonclustered index.", "index_insert"),
    ("Index Scan", "Scan a nonclustered index, entirely or only a range.", "index_scan"),
    ("Index Seek", "Scan a particular range of rows from a nonclustered index.", "index_seek"),
    ("Index Spool", "Reformats the data from its input into a temporary index, which is then used for seeking.", "index_spool"),
    ("Index Update", "Updates rows in a nonclustered index.", "index_update"),
    ("Inserted Scan", "Scans the inserted table within a trigger.", "inserted_scan"),
    ("Key Lookup", "Uses a supplied clustering key to lookup on a table that has a clustered index.", "key_lookup"),
    ("Log Row Scan", "Scans the transaction log.", "log_row_scan"),
    ("Merge Interval", "Merges multiple overlapping intervals into one.", "merge_interval"),
    ("Merge Join", "Match rows from two suitably sorted input tables exploiting their sort order.", "merge_join"),
    ("Nested Loops", "For each row in the top (outer) input, scan the bottom (inner) input, and output matching rows.", "nested_loops"),
    ("Online Index Insert", "Inserts rows into an index being built online.", "online_index_insert"),
    ("Parallelism", "An operation involving parallelism.", "parallelism"),
    ("Parameter Table Scan", "Scans a table acting as a parameter in the current query.", "parameter_table_scan"),
    ("Predict", "Scores rows with a machine learning model.", "predict"),
    ("Put", "Exports rows to an external data source.", "put"),
    ("Rank", "Computes ranking values.", "rank"),
    ("Remote Delete", "Removes rows from a remote object.", "remote_delete"),
    ("Remote Index Scan", "Scans an index of a remote object.", "remote_index_scan"),
    ("Remote Index Seek", "Seeks into an index of a remote object.", "remote_index_seek"),
    ("Remote Insert", "Inserts rows into a remote object.", "remote_insert"),
    ("Remote Query", "Submits a query to a remote source.", "remote_query"),
    ("Remote Scan", "Scans a remote object.", "remote_scan"),
    ("Remote Update", "Updates rows in a remote object.", "remote_update"),
    ("RID Lookup", "Uses a supplied row identifier to lookup on a heap.", "rid_lookup"),
    ("Row Count Spool", "Scans the input, counting how many rows are present.", "row_count_spool"),
    ("Segment", "Divides the input set into segments based on the value of one or more columns.", "segment"),
    ("Sequence", "Processes each input in order, from top to bottom.", "sequence"),
    ("Sequence Project", "Adds columns to perform computations over an ordered set.", "sequence_project"),
    ("Sort", "Sort the input.", "sort"),
    ("Split", "Splits each update into a delete and an insert.", "split"),
    ("Stream Aggregate", "Compute summary values for groups of rows in a suitably sorted stream.", "stream_aggregate"),
    ("Switch", "Outputs rows from one of its inputs, chosen by an expression.", "switch"),
    ("Table Delete", "Removes rows from a heap.", "table_delete"),
    ("Table Insert", "Inserts rows into a heap.", "table_insert"),
    ("Table Merge", "Applies inserts, updates and deletes to a heap.", "table_merge"),
    ("Table Scan", "Scan rows from a table.", "table_scan"),
    ("Table Spool", "Stores the data from the input into a temporary table in order to optimize rewinds.", "table_spool"),
    ("Table Update", "Updates rows in a heap.", "table_update"),
    ("Table-valued function", "Table-valued function.", "table_valued_function"),
    ("Top", "Select the first few rows based on a sort order.", "top"),
    ("Top N Sort", "Sorts the input and returns the first few rows.", "top_n_sort"),
    ("UDX", "Extended operator implemented in managed code.", "udx"),
    ("Window Aggregate", "Computes window aggregates in batch mode.", "window_aggregate"),
    ("Window Spool", "Expands each row into the set of rows that represents the window associated with it.", "window_spool"),
    ("Fetch Query", "The query used to retrieve rows when a fetch is issued against a cursor.", "fetch_query"),
    ("Populate Query", "The query used to populate a cursor's work table when the cursor is opened.", "populate_query"),
    ("Refresh Query", "Fetches current data for rows in the fetch buffer.", "refresh_query"),
];

/// Only a handful of logical operators carry their own icon
const LOGICAL_OPERATORS: &[(&str, Option<&str>, Option<&str>)] = &[
    ("Aggregate", Some("Computes aggregate values."), None),
    ("Anti Semi Join", Some("Returns rows from the first input with no match in the second."), None),
    ("Assert", None, None),
    ("Async Concat", None, None),
    ("Batch Hash Table Build", None, None),
    ("Bitmap Create", None, None),
    ("Clustered Index Scan", None, None),
    ("Clustered Index Seek", None, None),
    ("Clustered Update", None, None),
    ("Collapse", None, None),
    ("Compute Scalar", None, None),
    ("Concatenation", None, None),
    ("Constant Scan", None, None),
    ("Cross Join", None, None),
    ("Delete", None, None),
    ("Deleted Scan", None, None),
    ("Distinct Sort", None, None),
    ("Distinct", None, None),
    ("Distribute Streams", Some("Distributes a single input stream into multiple streams."), Some("parallelism_distribute")),
    ("Eager Spool", None, None),
    ("Filter", None, None),
    ("Flow Distinct", None, None),
    ("Foreign Key References Check", None, None),
    ("Full Outer Join", None, None),
    ("Gather Streams", Some("Combines multiple input streams into a single stream."), Some("parallelism_gather")),
    ("Index Scan", None, None),
    ("Index Seek", None, None),
    ("Inner Join", None, None),
    ("Insert", None, None),
    ("Inserted Scan", None, None),
    ("Intersect", None, None),
    ("Intersect All", None, None),
    ("Lazy Spool", None, None),
    ("Left Anti Semi Join", None, None),
    ("Left Outer Join", None, None),
    ("Left Semi Join", None, None),
    ("Log Row Scan", None, None),
    ("Merge", None, None),
    ("Merge Interval", None, None),
    ("Parameter Table Scan", None, None),
    ("Partial Aggregate", None, None),
    ("Print", None, None),
    ("Put", None, None),
    ("Rank", None, None),
    ("Remote Delete", None, None),
    ("Remote Index Scan", None, None),
    ("Remote Index Seek", None, None),
    ("Remote Insert", None, None),
    ("Remote Query", None, None),
    ("Remote Scan", None, None),
    ("Remote Update", None, None),
    ("Repartition Streams", Some("Consumes multiple streams and produces multiple streams of records."), Some("parallelism_repartition")),
    ("RID Lookup", None, None),
    ("Right Anti Semi Join", None, None),
    ("Right Outer Join", None, None),
    ("Right Semi Join", None, None),
    ("Segment", None, None),
    ("Sequence", None, None),
    ("Sort", None, None),
    ("Split", None, None),
    ("Switch", None, None),
    ("Table-valued function", None, None),
    ("Table Scan", None, None),
    ("Top", None, None),
    ("TopN Sort", None, None),
    ("UDX", None, None),
    ("Union", None, None),
    ("Union All", None, None),
    ("Update", None, None),
    ("Local Stats", None, None),
    ("Window Spool", None, None),
    ("Window Aggregate", None, None),
    ("Key Lookup", None, None),
];

const STATEMENTS: &[Entry] = &[
    ("SELECT", "Retrieves rows from the database.", "result"),
    ("SELECT INTO", "Creates a new table from the result of a query.", "result"),
    ("INSERT", "Adds rows to a table or view.", "result"),
    ("UPDATE", "Changes existing data in a table or view.", "result"),
    ("DELETE", "Removes rows from a table or view.", "result"),
    ("MERGE", "Performs insert, update or delete operations on a target table based on a join with a source.", "result"),
    ("COND", "Conditional statement.", "cond"),
    ("WHILE", "Loop.", "language_construct_catch_all"),
    ("ASSIGN", "Assigns a value to a variable.", "assign"),
    ("DECLARE", "Declares a variable.", "declare"),
    ("DECLARE CURSOR", "Declares a cursor.", "declare"),
    ("SET ON/OFF", "Changes a session option.", "set_on_off"),
    ("SET ROWCOUNT", "Limits the number of rows affected by subsequent statements.", "set_on_off"),
    ("EXECUTE PROC", "Executes a stored procedure.", "execute"),
    ("EXECUTE", "Executes a command string or module.", "execute"),
    ("RETURN", "Exits unconditionally from a query or procedure.", "language_construct_catch_all"),
    ("USE DATABASE", "Changes the database context.", "use_database"),
    ("CREATE TABLE", "Creates a table.", "language_construct_catch_all"),
    ("CREATE INDEX", "Creates an index.", "language_construct_catch_all"),
    ("ALTER TABLE", "Modifies a table definition.", "language_construct_catch_all"),
    ("ALTER INDEX", "Modifies an index.", "language_construct_catch_all"),
    ("CREATE STATISTICS", "Creates statistics.", "language_construct_catch_all"),
    ("UPDATE STATISTICS", "Updates statistics.", "language_construct_catch_all"),
    ("TRUNCATE TABLE", "Removes all rows from a table.", "language_construct_catch_all"),
    ("BEGIN TRANSACTION", "Starts a transaction.", "language_construct_catch_all"),
    ("COMMIT TRANSACTION", "Commits a transaction.", "language_construct_catch_all"),
    ("ROLLBACK TRANSACTION", "Rolls back a transaction.", "language_construct_catch_all"),
    ("RECEIVE", "Retrieves messages from a Service Broker queue.", "receive"),
    ("OPEN CURSOR", "Opens a cursor.", "cursor_catch_all"),
    ("FETCH CURSOR", "Fetches a row from a cursor.", "cursor_catch_all"),
    ("CLOSE CURSOR", "Closes a cursor.", "cursor_catch_all"),
    ("DEALLOCATE CURSOR", "Deallocates a cursor.", "cursor_catch_all"),
    ("Stored Procedure", "Body of a stored procedure.", "stored_procedure"),
    ("User Defined Function", "Body of a user-defined function.", "udf"),
    ("External Distributed Computation", "Distributed computation executed outside the engine.", "language_construct_catch_all"),
];

const CURSOR_TYPES: &[Entry] = &[
    ("Dynamic", "Cursor that can see all changes made to underlying data.", "dynamic_cursor"),
    ("FastForward", "Forward-only, read-only cursor.", "fast_forward_cursor"),
    ("Keyset", "Cursor that can see updates but not inserts made by other users.", "keyset_cursor"),
    ("SnapShot", "Static cursor that does not see changes to the underlying data.", "snapshot_cursor"),
];

/// Immutable lookup tables for operations
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    physical: HashMap<String, Operation>,
    logical: HashMap<String, Operation>,
    statements: HashMap<String, Operation>,
    cursors: HashMap<String, Operation>,
}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorCatalog {
    pub fn new() -> Self {
        let table = |entries: &[Entry]| -> HashMap<String, Operation> {
            entries
                .iter()
                .map(|(name, desc, icon)| (name.to_string(), Operation::new(name, Some(desc), Some(icon))))
                .collect()
        };

        let logical = LOGICAL_OPERATORS
            .iter()
            .map(|(name, desc, icon)| (name.to_string(), Operation::new(name, *desc, *icon)))
            .collect();

        Self {
            physical: table(PHYSICAL_OPERATORS),
            logical,
            statements: table(STATEMENTS),
            cursors: table(CURSOR_TYPES),
        }
    }

    pub fn physical_operation(&self, name: &str) -> Operation {
        Self::resolve(&self.physical, name, ITERATOR_CATCH_ALL)
    }

    pub fn logical_operation(&self, name: &str) -> Operation {
        Self::resolve(&self.logical, name, ITERATOR_CATCH_ALL)
    }

    pub fn statement(&self, name: &str) -> Operation {
        Self::resolve(&self.statements, name, LANGUAGE_CONSTRUCT_CATCH_ALL)
    }

    pub fn cursor_type(&self, name: &str) -> Operation {
        Self::resolve(&self.cursors, name, CURSOR_CATCH_ALL)
    }

    pub fn lookup(&self, kind: OperationKind, name: &str) -> Operation {
        match kind {
            OperationKind::Physical => self.physical_operation(name),
            OperationKind::Logical => self.logical_operation(name),
            OperationKind::Statement => self.statement(name),
            OperationKind::Cursor => self.cursor_type(name),
        }
    }

    /// True when `name` (or its external form) is a known entry
    pub fn contains(&self, kind: OperationKind, name: &str) -> bool {
        let table = match kind {
            OperationKind::Physical => &self.physical,
            OperationKind::Logical => &self.logical,
            OperationKind::Statement => &self.statements,
            OperationKind::Cursor => &self.cursors,
        };
        table.contains_key(name) || table.contains_key(&external_name(name))
    }

    fn resolve(table: &HashMap<String, Operation>, name: &str, catch_all: CatchAll) -> Operation {
        if let Some(op) = table.get(name) {
            return op.clone();
        }
        if let Some(op) = table.get(&external_name(name)) {
            return op.clone();
        }
        Operation::new(name, Some(catch_all.description), Some(catch_all.icon))
    }
}

/// Recover the public name from a symbolic enum identifier
///
/// `ClusteredIndexSeek` becomes `Clustered Index Seek`, `RIDLookup` becomes
/// `RID Lookup`. Names that already contain spaces are returned unchanged.
pub fn external_name(name: &str) -> String {
    if name.contains(' ') {
        return name.to_string();
    }
    let mut words: Vec<String> = Vec::new();
    for m in SYMBOLIC_WORD_REGEX.find_iter(name) {
        let word = m.as_str();
        // "RIDLookup" matches as "RIDL" + "ookup"; give the trailing capital back
        let upper_run = word.chars().take_while(|c| c.is_ascii_uppercase()).count();
        if upper_run > 1 && upper_run < word.len() {
            let split = word
                .char_indices()
                .nth(upper_run - 1)
                .map(|(i, _)| i)
                .unwrap_or(0);
            words.push(word[..split].to_string());
            words.push(word[split..].to_string());
        } else {
            words.push(word.to_string());
        }
    }
    if words.is_empty() { name.to_string() } else { words.join(" ") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_physical_operation() {
        let catalog = OperatorCatalog::new();
        let op = catalog.physical_operation("Clustered Index Seek");
        assert_eq!(op.display_name, "Clustered Index Seek");
        assert_eq!(op.icon.as_deref(), Some("clustered_index_seek"));
    }

    #[test]
    fn test_unknown_physical_operation_is_catch_all() {
        let catalog = OperatorCatalog::new();
        let op = catalog.physical_operation("NoSuchOperator123");
        assert_eq!(op.name, "NoSuchOperator123");
        assert_eq!(op.icon.as_deref(), Some("iterator_catch_all"));
    }

    #[test]
    fn test_unknown_statement_and_cursor_use_their_own_catch_all() {
        let catalog = OperatorCatalog::new();
        assert_eq!(
            catalog.statement("FROBNICATE").icon.as_deref(),
            Some("language_construct_catch_all")
        );
        assert_eq!(catalog.cursor_type("Teleport").icon.as_deref(), Some("cursor_catch_all"));
    }

    #[test]
    fn test_symbolic_names_are_normalized() {
        let catalog = OperatorCatalog::new();
        assert_eq!(catalog.physical_operation("ClusteredIndexSeek").name, "Clustered Index Seek");
        assert_eq!(catalog.physical_operation("FetchQuery").name, "Fetch Query");
        assert_eq!(catalog.physical_operation("RIDLookup").name, "RID Lookup");
        assert_eq!(catalog.physical_operation("TopNSort").name, "Top N Sort");
    }

    #[test]
    fn test_external_name() {
        assert_eq!(external_name("ClusteredIndexSeek"), "Clustered Index Seek");
        assert_eq!(external_name("RIDLookup"), "RID Lookup");
        assert_eq!(external_name("Index Seek"), "Index Seek");
        assert_eq!(external_name("UDX"), "UDX");
    }

    #[test]
    fn test_logical_decoration() {
        let catalog = OperatorCatalog::new();
        assert!(catalog.logical_operation("Gather Streams").is_fully_decorated());
        assert!(!catalog.logical_operation("Inner Join").is_fully_decorated());
        assert!(catalog.contains(OperationKind::Logical, "Inner Join"));
        assert!(!catalog.contains(OperationKind::Logical, "Warp Join"));
    }

    #[test]
    fn test_operation_kind_from_str() {
        assert_eq!("Physical".parse::<OperationKind>(), Ok(OperationKind::Physical));
        assert!("bogus".parse::<OperationKind>().is_err());
    }
}
