//! Estimates the material volume and weight needed to print a
//! triangulated solid, given print parameters and a material density.
//! The [`orchestrator::Estimator`] walks a chain of fallback tiers so a
//! usable estimate comes back even when high-fidelity computation
//! fails.

use nalgebra::Vector3;

pub mod error;
pub mod geometry;
pub mod model;
pub mod orchestrator;
pub mod remote;

pub use common::config::PrintParameters;
pub use error::EstimateError;
pub use model::{Method, VolumeBreakdown};
pub use orchestrator::{Estimator, EstimatorConfig, RemoteConfig};

pub type Pos = Vector3<f32>;

#[cfg(test)]
pub(crate) mod test_util;
