pub mod flatten;
pub mod missing_index;
pub mod record_set;

pub use flatten::{extract_functions, flatten_condition_clauses};
pub use missing_index::describe_statement;
pub use record_set::{ShowPlanRow, build_record_set_graphs};
