//! Batch preprocessing: hoist procedure bodies and conditional branches
//!
//! Both passes turn nested statements into a flat, ordered statement list so
//! every entry can be built as its own graph.

use crate::services::showplan::parser::core::document::is_statement;
use crate::services::showplan::parser::core::xml_element::XmlElement;

const FUNCTION_ELEMENTS: &[&str] = &["StoredProc", "UDF"];
const BRANCH_ELEMENTS: &[&str] = &["Then", "Else"];
/// Children that still produce nodes under a statement without a type
const NODE_ELEMENTS: &[&str] = &["QueryPlan", "CursorPlan", "StoredProc", "UDF"];

/// Hoist `StoredProc` and `UDF` bodies into sibling statements
///
/// Each function follows the statement that called it, wrapped in a carrier
/// `StmtSimple` without a statement type. Functions called from a function body
/// are hoisted the same way and follow their caller.
///
/// A statement that is already a carrier (the single-statement XML of a hoisted
/// function) is kept as it is, and a statement left with nothing that renders
/// a node is dropped.
pub fn extract_functions(statements: Vec<XmlElement>) -> Vec<XmlElement> {
    let mut out = Vec::with_capacity(statements.len());
    for statement in statements {
        if is_carrier(&statement) {
            for function in statement.children {
                push_function(function, &mut out);
            }
            continue;
        }

        let mut statement = statement;
        let functions = detach_functions(&mut statement);
        if renders_nodes(&statement) {
            out.push(statement);
        }
        for function in functions {
            push_function(function, &mut out);
        }
    }
    out
}

/// No statement type of its own, only function children
fn is_carrier(statement: &XmlElement) -> bool {
    !statement.has_attr("StatementType")
        && !statement.children.is_empty()
        && statement.children.iter().all(|c| FUNCTION_ELEMENTS.contains(&c.name.as_str()))
}

fn renders_nodes(statement: &XmlElement) -> bool {
    statement.has_attr("StatementType")
        || statement.children.iter().any(|c| NODE_ELEMENTS.contains(&c.name.as_str()))
}

fn push_function(mut function: XmlElement, out: &mut Vec<XmlElement>) {
    let mut nested = Vec::new();
    if let Some(body) = function.child_mut("Statements") {
        for statement in body.children.iter_mut().filter(|s| is_statement(s)) {
            nested.extend(detach_functions(statement));
        }
    }
    out.push(XmlElement::new("StmtSimple").with_child(function));
    for function in nested {
        push_function(function, out);
    }
}

/// Remove the functions called by `statement`, including those under an IF
fn detach_functions(statement: &mut XmlElement) -> Vec<XmlElement> {
    let mut functions = take_children(statement, FUNCTION_ELEMENTS);
    if let Some(condition) = statement.child_mut("Condition") {
        functions.extend(take_children(condition, FUNCTION_ELEMENTS));
    }
    for branch in statement
        .children
        .iter_mut()
        .filter(|c| BRANCH_ELEMENTS.contains(&c.name.as_str()))
    {
        if let Some(body) = branch.child_mut("Statements") {
            for nested in body.children.iter_mut().filter(|s| is_statement(s)) {
                functions.extend(detach_functions(nested));
            }
        }
    }
    functions
}

fn take_children(element: &mut XmlElement, names: &[&str]) -> Vec<XmlElement> {
    let (taken, kept): (Vec<XmlElement>, Vec<XmlElement>) = std::mem::take(&mut element.children)
        .into_iter()
        .partition(|c| names.contains(&c.name.as_str()));
    element.children = kept;
    taken
}

/// Hoist THEN and ELSE bodies of every `StmtCond` into the statement list
///
/// The COND statement keeps its condition and is followed by the THEN
/// statements, then the ELSE statements, each flattened recursively.
pub fn flatten_condition_clauses(statements: Vec<XmlElement>) -> Vec<XmlElement> {
    let mut out = Vec::with_capacity(statements.len());
    for statement in statements {
        flatten_into(statement, &mut out);
    }
    out
}

fn flatten_into(mut statement: XmlElement, out: &mut Vec<XmlElement>) {
    if statement.name != "StmtCond" {
        out.push(statement);
        return;
    }

    let branches = take_children(&mut statement, BRANCH_ELEMENTS);
    out.push(statement);
    for name in BRANCH_ELEMENTS {
        let bodies = branches
            .iter()
            .filter(|b| b.name == *name)
            .filter_map(|b| b.child("Statements"));
        for body in bodies {
            for nested in body.children.iter().filter(|s| is_statement(s)) {
                flatten_into(nested.clone(), out);
            }
        }
    }
}
