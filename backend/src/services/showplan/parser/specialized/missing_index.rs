//! Statement description: query text and missing-index suggestions

use crate::services::showplan::models::{Description, MissingIndex};
use crate::services::showplan::parser::core::xml_element::XmlElement;

const INDEX_NAME_PLACEHOLDER: &str = "[<Name of Missing Index, sysname,>]";
const MEMORY_OPTIMIZED: &str = "MemoryOptimized";
const SCAN_ELEMENTS: &[&str] = &["IndexScan", "TableScan"];

/// Derive the description of one statement from its XML
pub fn describe_statement(statement: &XmlElement) -> Description {
    let query_text = statement.attr("StatementText").unwrap_or_default().trim().to_string();
    let missing_indexes = statement
        .descendants_named("MissingIndexGroup")
        .flat_map(|group| {
            let impact = group.attr("Impact").unwrap_or("0");
            group
                .children_named("MissingIndex")
                .map(move |index| missing_index(statement, index, impact))
        })
        .collect();

    Description { query_text, missing_indexes }
}

fn missing_index(statement: &XmlElement, index: &XmlElement, impact: &str) -> MissingIndex {
    let database = index.attr("Database").unwrap_or_default().to_string();
    let schema = index.attr("Schema").unwrap_or_default().to_string();
    let table = index.attr("Table").unwrap_or_default().to_string();

    let mut key_columns = usage_columns(index, "EQUALITY");
    key_columns.extend(usage_columns(index, "INEQUALITY"));
    let include_columns = usage_columns(index, "INCLUDE");

    let is_memory_optimized = is_memory_optimized(statement, &database, &schema, &table);
    let query_text = index_ddl(&schema, &table, &key_columns, &include_columns, is_memory_optimized);
    let caption = format!("Missing Index (Impact {}): {}", impact, query_text.replace('\n', " "));

    MissingIndex {
        database,
        schema,
        table,
        impact: impact.parse().unwrap_or(0.0),
        is_memory_optimized,
        query_text,
        caption,
    }
}

fn usage_columns(index: &XmlElement, usage: &str) -> Vec<String> {
    index
        .children_named("ColumnGroup")
        .filter(|g| g.attr("Usage") == Some(usage))
        .flat_map(|g| g.children_named("Column"))
        .filter_map(|c| c.attr("Name"))
        .map(str::to_string)
        .collect()
}

/// Whether the scan reading the suggested table uses memory-optimized storage
fn is_memory_optimized(statement: &XmlElement, database: &str, schema: &str, table: &str) -> bool {
    statement
        .descendants()
        .filter(|e| SCAN_ELEMENTS.contains(&e.name.as_str()))
        .filter(|scan| {
            scan.children_named("Object").any(|o| {
                o.attr("Table") == Some(table)
                    && o.attr("Schema").is_none_or(|s| s == schema)
                    && o.attr("Database").is_none_or(|d| d == database)
            })
        })
        .any(|scan| scan.attr("Storage") == Some(MEMORY_OPTIMIZED))
}

/// Templated DDL for a suggested index
pub fn index_ddl(
    schema: &str,
    table: &str,
    key_columns: &[String],
    include_columns: &[String],
    is_memory_optimized: bool,
) -> String {
    let columns = key_columns.join(", ");
    if is_memory_optimized {
        return format!(
            "ALTER TABLE {}.{}\nADD INDEX {}\nNONCLUSTERED ({})",
            schema, table, INDEX_NAME_PLACEHOLDER, columns
        );
    }

    let mut ddl = format!(
        "CREATE NONCLUSTERED INDEX {}\nON {}.{} ({})",
        INDEX_NAME_PLACEHOLDER, schema, table, columns
    );
    if !include_columns.is_empty() {
        ddl.push_str(&format!("\nINCLUDE ({})", include_columns.join(", ")));
    }
    ddl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_group(usage: &str, names: &[&str]) -> XmlElement {
        names.iter().fold(XmlElement::new("ColumnGroup").with_attr("Usage", usage), |g, n| {
            g.with_child(XmlElement::new("Column").with_attr("Name", *n))
        })
    }

    fn statement_with_index(storage: &str) -> XmlElement {
        let index = XmlElement::new("MissingIndex")
            .with_attr("Database", "[Sales]")
            .with_attr("Schema", "[dbo]")
            .with_attr("Table", "[Orders]")
            .with_child(column_group("EQUALITY", &["[CustomerId]"]))
            .with_child(column_group("INEQUALITY", &["[OrderDate]"]))
            .with_child(column_group("INCLUDE", &["[Total]", "[Status]"]));
        let scan = XmlElement::new("IndexScan").with_attr("Storage", storage).with_child(
            XmlElement::new("Object")
                .with_attr("Database", "[Sales]")
                .with_attr("Schema", "[dbo]")
                .with_attr("Table", "[Orders]"),
        );
        XmlElement::new("StmtSimple")
            .with_attr("StatementText", "SELECT * FROM Orders WHERE CustomerId = 1 ")
            .with_child(
                XmlElement::new("QueryPlan")
                    .with_child(
                        XmlElement::new("MissingIndexes").with_child(
                            XmlElement::new("MissingIndexGroup").with_attr("Impact", "87.5").with_child(index),
                        ),
                    )
                    .with_child(XmlElement::new("RelOp").with_child(scan)),
            )
    }

    #[test]
    fn test_disk_based_index_ddl() {
        let description = describe_statement(&statement_with_index("RowStore"));
        assert_eq!(description.query_text, "SELECT * FROM Orders WHERE CustomerId = 1");
        assert_eq!(description.missing_indexes.len(), 1);

        let index = &description.missing_indexes[0];
        assert!(!index.is_memory_optimized);
        assert_eq!(index.impact, 87.5);
        assert_eq!(
            index.query_text,
            "CREATE NONCLUSTERED INDEX [<Name of Missing Index, sysname,>]\n\
             ON [dbo].[Orders] ([CustomerId], [OrderDate])\n\
             INCLUDE ([Total], [Status])"
        );
        assert_eq!(
            index.caption,
            "Missing Index (Impact 87.5): CREATE NONCLUSTERED INDEX [<Name of Missing Index, sysname,>] \
             ON [dbo].[Orders] ([CustomerId], [OrderDate]) INCLUDE ([Total], [Status])"
        );
    }

    #[test]
    fn test_memory_optimized_index_ddl_has_no_include() {
        let description = describe_statement(&statement_with_index("MemoryOptimized"));
        let index = &description.missing_indexes[0];
        assert!(index.is_memory_optimized);
        assert_eq!(
            index.query_text,
            "ALTER TABLE [dbo].[Orders]\n\
             ADD INDEX [<Name of Missing Index, sysname,>]\n\
             NONCLUSTERED ([CustomerId], [OrderDate])"
        );
    }

    #[test]
    fn test_no_include_clause_without_include_columns() {
        let ddl = index_ddl("[dbo]", "[T]", &["[a]".to_string()], &[], false);
        assert_eq!(ddl, "CREATE NONCLUSTERED INDEX [<Name of Missing Index, sysname,>]\nON [dbo].[T] ([a])");
    }

    #[test]
    fn test_statement_without_suggestions() {
        let description = describe_statement(&XmlElement::new("StmtSimple").with_attr("StatementText", "SELECT 1"));
        assert!(!description.has_missing_indexes());
    }
}
