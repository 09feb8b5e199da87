//! Fetch-filter pipeline and request controller for stockq.
//!
//! - `FetchFilterPipeline`: read lines → skip header → parse → filter by
//!   identifier, producing exactly one `PipelineOutcome` per run
//! - `RequestController`: owns at most one in-flight run and exposes
//!   start/cancel as a single `toggle`

pub mod controller;
pub mod error;
pub mod outcome;
pub mod pipeline;

pub use controller::{
    Affordance, ControllerEvent, ControllerState, RequestController, RunHandle, RunReport,
    ToggleAction,
};
pub use error::{PipelineError, PipelineResult};
pub use outcome::PipelineOutcome;
pub use pipeline::{FetchFilterPipeline, PipelineConfig};
