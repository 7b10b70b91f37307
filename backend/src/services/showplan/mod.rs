//! SQL Server ShowPlan engine
//!
//! Turns execution plans (ShowPlan XML, or the legacy `SHOWPLAN_ALL` rows)
//! into one operator graph per statement, with costs, run-time statistics and
//! missing-index suggestions ready for display.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ShowPlanBuilder                          │
//! │                  build() / build_statement()                  │
//! │                             │                                 │
//! │        ┌────────────────────┼────────────────────┐           │
//! │        ▼                    ▼                    ▼           │
//! │  ┌───────────┐     ┌─────────────────┐   ┌──────────────┐    │
//! │  │ Document  │     │   TreeBuilder   │   │  Specialized │    │
//! │  │ XmlElement│     │ ParserRegistry  │   │ flatten      │    │
//! │  │ PlanSource│     │ ┌─────────────┐ │   │ missing_index│    │
//! │  └───────────┘     │ │ Statement   │ │   │ record_set   │    │
//! │                    │ │ RelOp       │ │   └──────────────┘    │
//! │                    │ │ Filter/Merge│ │                       │
//! │                    │ │ Cursor/Cond │ │                       │
//! │                    │ └─────────────┘ │                       │
//! │                    └────────┬────────┘                       │
//! │                             ▼                                 │
//! │   ┌──────────┐   ┌─────────────────┐   ┌──────────────────┐  │
//! │   │ Catalog  │   │  ShowPlanGraph  │   │ PropertyBag      │  │
//! │   │Operation │   │  Node / Edge    │   │ RunTimeCounters  │  │
//! │   └──────────┘   └─────────────────┘   └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqltools_service::services::showplan::{BuildOptions, OperatorCatalog, PlanSource, ShowPlanBuilder};
//!
//! let builder = ShowPlanBuilder::new(Arc::new(OperatorCatalog::new()));
//! let output = builder.build(PlanSource::Xml(plan_xml), &BuildOptions::default())?;
//! for graph in &output.graphs {
//!     let root = graph.root_id().unwrap();
//!     println!("{} {}", graph.node(root).display_name(), graph.display_cost(root));
//! }
//! ```

pub mod catalog;
pub mod counters;
pub mod models;
pub mod parser;
pub mod properties;

#[cfg(test)]
mod tests;

pub use catalog::{Operation, OperationKind, OperatorCatalog};
pub use counters::{CounterDisplay, RunTimeCounters};
pub use models::{Description, Edge, GraphView, MissingIndex, Node, NodeId, ShowPlanGraph};
pub use parser::core::{PlanSource, ShowPlanDocument};
pub use parser::specialized::ShowPlanRow;
pub use parser::{BuildOptions, BuildOutput, ParseError, ParseResult, ShowPlanBuilder, StatementFailure};
pub use properties::{Property, PropertyBag, PropertyValue};
