//! ShowPlan parsing
//!
//! `core` holds the XML model and the per-element parsers, `specialized` the
//! batch preprocessing passes and secondary formats, and `composer` drives
//! them to produce one graph per statement.

pub mod composer;
pub mod core;
pub mod error;
pub mod specialized;

pub use composer::{BuildOptions, BuildOutput, ShowPlanBuilder, StatementFailure};
pub use error::{ParseError, ParseResult};
