//! Preprocessing toolkit that turns raw food-balance and health-indicator
//! exports into analysis-ready country-year tables.

pub mod countries;
pub mod error;
pub mod food_groups;
pub mod model;
pub mod nutrients;
pub mod obesity;
pub mod population;
pub mod schema;
pub mod units;

pub use error::PanelError;
pub use model::{PanelModel, PipelineOutputs};
pub use population::PopulationLookup;
