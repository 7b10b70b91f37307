//! Conversion of raw XML fields into presentation-ready property values
//!
//! Attributes are typed (bool, integer, number, text). Child elements are
//! either flattened into one readable string (column lists, scalar
//! expressions, seek predicates, defined values) or turned into an expandable
//! nested property set.

use super::{PropertyBag, PropertyFactory, PropertyValue};
use crate::services::showplan::parser::core::xml_element::XmlElement;

const COLUMN_REFERENCE: &str = "ColumnReference";
const SCALAR_OPERATOR: &str = "ScalarOperator";

/// Type a raw attribute string
pub fn convert_attribute(raw: &str) -> PropertyValue {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return PropertyValue::Boolean(true),
        "false" => return PropertyValue::Boolean(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return PropertyValue::Integer(i);
    }
    if !trimmed.is_empty() && !trimmed.starts_with("0x") {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return PropertyValue::Number(n);
            }
        }
    }
    PropertyValue::Text(raw.to_string())
}

/// Convert a child element into the value stored under its element name
pub fn convert_element(element: &XmlElement) -> PropertyValue {
    match element.name.as_str() {
        COLUMN_REFERENCE => PropertyValue::Text(column_text(element)),
        SCALAR_OPERATOR => PropertyValue::Text(scalar_text(element)),
        "Object" => object_value(element),
        "SeekPredicates" => PropertyValue::Text(seek_predicates_text(element)),
        "DefinedValues" => PropertyValue::Text(defined_values_text(element)),
        "OrderBy" => PropertyValue::Text(order_by_text(element)),
        "Warnings" => warnings_value(element),
        _ => generic_value(element),
    }
}

/// Add every attribute of `element` to `bag`
pub fn add_attributes(element: &XmlElement, bag: &mut PropertyBag, skip: impl Fn(&str) -> bool) {
    for (name, raw) in &element.attributes {
        if name.starts_with("xmlns") || skip(name) {
            continue;
        }
        bag.insert(PropertyFactory::from_attribute(name, raw));
    }
}

/// Add converted child elements to `bag`; repeated names become a list
pub fn add_children(element: &XmlElement, bag: &mut PropertyBag, skip: impl Fn(&str) -> bool) {
    let mut seen: Vec<&str> = Vec::new();
    for child in &element.children {
        let name = child.name.as_str();
        if skip(name) || seen.contains(&name) {
            continue;
        }
        seen.push(name);

        let same: Vec<&XmlElement> = element.children_named(name).collect();
        let value = if same.len() == 1 {
            convert_element(child)
        } else {
            PropertyValue::List(same.into_iter().map(convert_element).collect())
        };
        bag.set(name, value);
    }
}

/// `[db].[schema].[table] as [alias].[column]` with absent parts left out
pub fn column_text(column: &XmlElement) -> String {
    let mut prefix: Vec<String> = ["Server", "Database", "Schema", "Table"]
        .iter()
        .filter_map(|key| column.attr(key))
        .map(str::to_string)
        .collect();
    if let Some(alias) = column.attr("Alias") {
        match prefix.last_mut() {
            Some(last) => {
                last.push_str(" as ");
                last.push_str(alias);
            }
            None => prefix.push(alias.to_string()),
        }
    }
    let column_name = column.attr("Column").unwrap_or_default();
    if prefix.is_empty() {
        column_name.to_string()
    } else {
        format!("{}.{}", prefix.join("."), column_name)
    }
}

/// Comma-joined column references found directly under `element`
pub fn column_list_text(element: &XmlElement) -> String {
    element
        .children_named(COLUMN_REFERENCE)
        .map(column_text)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn scalar_text(scalar: &XmlElement) -> String {
    scalar.attr("ScalarString").unwrap_or_default().to_string()
}

/// `[db].[schema].[table].[index] [alias]`
pub fn object_text(object: &XmlElement) -> String {
    let name = ["Server", "Database", "Schema", "Table", "Index"]
        .iter()
        .filter_map(|key| object.attr(key))
        .collect::<Vec<_>>()
        .join(".");
    match object.attr("Alias") {
        Some(alias) => format!("{} {}", name, alias),
        None => name,
    }
}

fn object_value(object: &XmlElement) -> PropertyValue {
    let mut bag = PropertyBag::new();
    add_attributes(object, &mut bag, |_| false);
    add_children(object, &mut bag, |_| false);
    PropertyValue::nested(object_text(object), bag)
}

fn seek_predicates_text(element: &XmlElement) -> String {
    let predicates: Vec<&XmlElement> = element
        .children
        .iter()
        .filter(|c| matches!(c.name.as_str(), "SeekPredicate" | "SeekPredicateNew" | "SeekPredicatePart"))
        .collect();

    let mut out = Vec::new();
    for (i, predicate) in predicates.iter().enumerate() {
        // SeekPredicateNew wraps one or more SeekKeys; the older form holds the ranges directly
        let key_sets: Vec<&XmlElement> = match predicate.name.as_str() {
            "SeekPredicateNew" => predicate.children_named("SeekKeys").collect(),
            "SeekPredicatePart" => predicate
                .descendants_named("SeekKeys")
                .collect(),
            _ => vec![*predicate],
        };
        let parts: Vec<String> = key_sets
            .iter()
            .flat_map(|keys| keys.children.iter())
            .filter_map(range_text)
            .collect();
        out.push(format!("Seek Keys[{}]: {}", i + 1, parts.join(", ")));
    }
    out.join(", ")
}

fn range_text(range: &XmlElement) -> Option<String> {
    let label = match range.name.as_str() {
        "Prefix" => "Prefix",
        "StartRange" => "Start",
        "EndRange" => "End",
        "IsNotNull" => "IsNotNull",
        _ => return None,
    };
    let op = match range.attr("ScanType").unwrap_or("EQ") {
        "EQ" => "=",
        "GE" => ">=",
        "GT" => ">",
        "LE" => "<=",
        "LT" => "<",
        "NE" => "<>",
        "IS" => "IS",
        "IS NOT" | "ISNOT" => "IS NOT",
        other => other,
    };
    let columns: Vec<String> = range
        .child("RangeColumns")
        .map(|c| c.children_named(COLUMN_REFERENCE).map(column_text).collect())
        .unwrap_or_default();
    let expressions: Vec<String> = range
        .child("RangeExpressions")
        .map(|e| e.children_named(SCALAR_OPERATOR).map(scalar_text).collect())
        .unwrap_or_default();

    let pairs: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| match expressions.get(i) {
            Some(expr) => format!("{} {} {}", col, op, expr),
            None => col.clone(),
        })
        .collect();
    Some(format!("{}: {}", label, pairs.join(", ")))
}

fn defined_values_text(element: &XmlElement) -> String {
    element
        .children_named("DefinedValue")
        .map(|dv| {
            let columns = column_list_text(dv);
            match dv.child(SCALAR_OPERATOR) {
                Some(scalar) => format!("{} = {}", columns, scalar_text(scalar)),
                None => columns,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_by_text(element: &XmlElement) -> String {
    element
        .children_named("OrderByColumn")
        .map(|obc| {
            let columns = column_list_text(obc);
            let direction = if obc.attr_bool("Ascending") { "Ascending" } else { "Descending" };
            format!("{} {}", columns, direction)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn warnings_value(element: &XmlElement) -> PropertyValue {
    let mut bag = PropertyBag::new();
    add_attributes(element, &mut bag, |_| false);
    add_children(element, &mut bag, |_| false);

    let mut names: Vec<String> = element
        .attributes
        .iter()
        .filter(|(_, v)| v.trim() == "true" || v.trim() == "1")
        .map(|(k, _)| k.clone())
        .collect();
    names.extend(element.children.iter().map(|c| c.name.clone()));
    names.dedup();
    PropertyValue::nested(names.join(", "), bag)
}

fn generic_value(element: &XmlElement) -> PropertyValue {
    if element.attributes.is_empty() {
        if element.children.is_empty() {
            return PropertyValue::Text(element.text.clone().unwrap_or_default());
        }
        // Column lists: OutputList, GroupBy, HashKeysBuild, OuterReferences, ...
        if element.children.iter().all(|c| c.name == COLUMN_REFERENCE) {
            return PropertyValue::Text(column_list_text(element));
        }
        // Single-expression wrappers: Predicate, ProbeResidual, TopExpression, ...
        if element.children.len() == 1 && element.children[0].name == SCALAR_OPERATOR {
            return PropertyValue::Text(scalar_text(&element.children[0]));
        }
        let first = element.children[0].name.as_str();
        if element.children.len() > 1 && element.children.iter().all(|c| c.name == first) {
            return PropertyValue::List(element.children.iter().map(convert_element).collect());
        }
    }

    let mut bag = PropertyBag::new();
    add_attributes(element, &mut bag, |_| false);
    add_children(element, &mut bag, |_| false);
    PropertyValue::nested(String::new(), bag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: &str, name: &str) -> XmlElement {
        XmlElement::new("ColumnReference")
            .with_attr("Database", "[AdventureWorks]")
            .with_attr("Schema", "[Sales]")
            .with_attr("Table", table)
            .with_attr("Column", name)
    }

    fn scalar(text: &str) -> XmlElement {
        XmlElement::new("ScalarOperator").with_attr("ScalarString", text)
    }

    #[test]
    fn test_attribute_typing() {
        assert_eq!(convert_attribute("true"), PropertyValue::Boolean(true));
        assert_eq!(convert_attribute("42"), PropertyValue::Integer(42));
        assert_eq!(convert_attribute("0.0032831"), PropertyValue::Number(0.0032831));
        assert_eq!(convert_attribute("0x1A2B"), PropertyValue::text("0x1A2B"));
        assert_eq!(convert_attribute("Row"), PropertyValue::text("Row"));
    }

    #[test]
    fn test_column_text() {
        let col = column("[SalesOrderHeader]", "CustomerID");
        assert_eq!(column_text(&col), "[AdventureWorks].[Sales].[SalesOrderHeader].CustomerID");

        let expr = XmlElement::new("ColumnReference").with_attr("Column", "Expr1002");
        assert_eq!(column_text(&expr), "Expr1002");

        let aliased = column("[SalesOrderHeader]", "CustomerID").with_attr("Alias", "[h]");
        assert_eq!(
            column_text(&aliased),
            "[AdventureWorks].[Sales].[SalesOrderHeader] as [h].CustomerID"
        );
    }

    #[test]
    fn test_output_list_flattens_to_columns() {
        let list = XmlElement::new("OutputList")
            .with_child(column("[T]", "a"))
            .with_child(column("[T]", "b"));
        assert_eq!(
            convert_element(&list),
            PropertyValue::text("[AdventureWorks].[Sales].[T].a, [AdventureWorks].[Sales].[T].b")
        );
    }

    #[test]
    fn test_predicate_flattens_to_scalar_string() {
        let predicate = XmlElement::new("Predicate").with_child(scalar("[T].[a]>(10)"));
        assert_eq!(convert_element(&predicate), PropertyValue::text("[T].[a]>(10)"));
    }

    #[test]
    fn test_seek_predicates() {
        let prefix = XmlElement::new("Prefix")
            .with_attr("ScanType", "EQ")
            .with_child(XmlElement::new("RangeColumns").with_child(column("[T]", "id")))
            .with_child(XmlElement::new("RangeExpressions").with_child(scalar("(5)")));
        let seek = XmlElement::new("SeekPredicates").with_child(
            XmlElement::new("SeekPredicateNew").with_child(XmlElement::new("SeekKeys").with_child(prefix)),
        );
        assert_eq!(
            convert_element(&seek),
            PropertyValue::text("Seek Keys[1]: Prefix: [AdventureWorks].[Sales].[T].id = (5)")
        );
    }

    #[test]
    fn test_defined_values() {
        let values = XmlElement::new("DefinedValues").with_child(
            XmlElement::new("DefinedValue")
                .with_child(XmlElement::new("ColumnReference").with_attr("Column", "Expr1003"))
                .with_child(scalar("Count(*)")),
        );
        assert_eq!(convert_element(&values), PropertyValue::text("Expr1003 = Count(*)"));
    }

    #[test]
    fn test_object_is_nested_with_summary() {
        let object = XmlElement::new("Object")
            .with_attr("Database", "[db]")
            .with_attr("Schema", "[dbo]")
            .with_attr("Table", "[T]")
            .with_attr("Index", "[PK_T]")
            .with_attr("Alias", "[t]");
        let value = convert_element(&object);
        assert_eq!(value.as_str(), Some("[db].[dbo].[T].[PK_T] [t]"));
        let bag = value.as_nested().unwrap();
        assert_eq!(bag.value("Index").and_then(|v| v.as_str()), Some("[PK_T]"));
    }

    #[test]
    fn test_warnings_summary() {
        let warnings = XmlElement::new("Warnings")
            .with_attr("NoJoinPredicate", "true")
            .with_child(XmlElement::new("SpillToTempDb").with_attr("SpillLevel", "1"));
        let value = convert_element(&warnings);
        assert_eq!(value.as_str(), Some("NoJoinPredicate, SpillToTempDb"));
        assert!(value.as_nested().unwrap().contains("SpillToTempDb"));
    }

    #[test]
    fn test_repeated_children_become_list() {
        let element = XmlElement::new("Update")
            .with_child(XmlElement::new("Object").with_attr("Table", "[A]"))
            .with_child(XmlElement::new("Object").with_attr("Table", "[B]"));
        let mut bag = PropertyBag::new();
        add_children(&element, &mut bag, |_| false);
        match bag.value("Object") {
            Some(PropertyValue::List(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }
}
