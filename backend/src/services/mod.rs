pub mod showplan;

pub use showplan::{BuildOptions, OperatorCatalog, PlanSource, ShowPlanBuilder};
