//! Response Parser
//!
//! Turns free-form model text into tool plans and trading analyses.
//! Nothing here fails hard on bad model output: callers get `None` or a
//! `Parse` error and decide how to degrade.

pub mod analysis;
pub mod chart;
pub mod extract;

pub use analysis::{parse_analysis, parse_confidence, parse_tool_plan};
pub use chart::{decimate, normalize, points_from_value, series_from_gathered, MAX_CHART_POINTS};
pub use extract::{extract, repair, Container, Extracted};
