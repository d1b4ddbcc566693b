//! Built-in transformation operators.
//!
//! Each operator is a pure function of its configuration and input
//! datasets. Outputs are new datasets whose columns are re-inferred from the
//! produced rows.

pub mod aggregate;
pub mod aggregation;
pub mod calculate;
pub mod clean;
pub mod filter;
pub mod group;
pub mod join;
pub mod pivot;
pub mod sort;

pub use aggregate::AggregateConfig;
pub use aggregation::{AggregateFunction, Aggregation};
pub use calculate::{CalculateConfig, Calculation};
pub use clean::{CleanConfig, CleanOperation};
pub use filter::{Condition, FilterConfig, FilterOperator};
pub use group::GroupConfig;
pub use join::{JoinConfig, JoinType};
pub use pivot::PivotConfig;
pub use sort::{SortConfig, SortDirection, SortKey};
