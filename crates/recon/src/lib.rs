//! `fuelaudit-recon`: fuel-purchase reconciliation engine.
//!
//! Pure engine crate: receives two materialized tables, returns the summary,
//! the normalized sources, the outer join and every finding set.
//! No CLI or IO dependencies.

pub mod aggregate;
pub mod coerce;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod value;

pub use aggregate::{Metric, SectorConsumption, Summary};
pub use config::ReconConfig;
pub use engine::{list_sectors, run};
pub use error::ReconError;
pub use model::{ReconInput, ReconResult};
pub use reconcile::SectorFilter;
pub use report::ResultTable;
pub use value::{RawTable, Scalar};
