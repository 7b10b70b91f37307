//! Element tree, document access and the operator parser family

pub mod control_flow_parser;
pub mod document;
pub mod operator_parser;
pub mod relop_parser;
pub mod statement_parser;
pub mod tree_builder;
pub mod xml_element;

pub use document::{PlanSource, ShowPlanDocument};
pub use operator_parser::{NodeBuilderContext, OperatorParser, ParserRegistry};
pub use tree_builder::TreeBuilder;
pub use xml_element::XmlElement;
