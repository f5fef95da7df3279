//! Tool layer: schema validation, the closed operation set, the registry and
//! health aggregation.

pub mod health;
pub mod operations;
pub mod registry;
pub mod schema;

pub use health::{HealthAggregator, HealthReport, HealthStatus, HealthThresholds};
pub use operations::{Operation, OperationError};
pub use registry::{ToolEntry, ToolRegistry};
pub use schema::{ParamDef, ParamType, ToolSpec, ValidationError};
