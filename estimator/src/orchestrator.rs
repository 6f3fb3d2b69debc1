//! Tiered estimation: remote service → local geometry → bounding box →
//! emergency constant. Tiers are tried in order, each one a fallback
//! for the previous; a tier failure is logged and control moves down
//! the chain, never back up. The chain always produces *some* result
//! for input that looked like a mesh at all.

use std::time::Duration;

use tracing::{debug, info, warn};

use common::{config::PrintParameters, progress::Progress, serde::SliceDeserializer, units::MM3_PER_CM3};
use mesh_format::stl;

use crate::{
    error::EstimateError,
    geometry::{self, GeometrySummary},
    model::{DecompositionModel, Method, VolumeBreakdown, WallAndCapModel},
    remote::RemoteTier,
};

/// Assumed solid fraction of the bounding box when full triangle
/// processing failed and only extents are known.
pub const HEURISTIC_DENSITY_FACTOR: f64 = 0.35;

/// Nominal print volume assumed when even a bounding box is
/// unobtainable.
pub const EMERGENCY_VOLUME_CM3: f64 = 50.0;

/// Endpoint of the external high-fidelity estimator.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    /// Full url of the estimate endpoint, e.g.
    /// `http://localhost:8000/estimate-weight`.
    pub url: String,
    /// Bound on connect, send, and receive. A slow remote service costs
    /// at most this long before the local tiers take over.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the estimator needs is passed in here; there is no
/// ambient global state.
#[derive(Clone, Debug, Default)]
pub struct EstimatorConfig {
    pub remote: Option<RemoteConfig>,
}

/// One fallback tier: attempt an estimate or decline with an error the
/// orchestrator recovers from.
pub trait EstimationTier: Send + Sync {
    fn method(&self) -> Method;

    fn attempt(
        &self,
        bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError>;
}

pub struct Estimator {
    tiers: Vec<Box<dyn EstimationTier>>,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let mut tiers: Vec<Box<dyn EstimationTier>> = Vec::new();
        if let Some(remote) = config.remote {
            tiers.push(Box::new(RemoteTier::new(remote)));
        }
        tiers.push(Box::new(LocalTier::new(Box::new(WallAndCapModel))));
        tiers.push(Box::new(BoundingBoxTier));
        tiers.push(Box::new(EmergencyTier));

        Self { tiers }
    }

    /// Replaces the standard chain, mainly for tests that need to force
    /// specific tiers to run.
    pub fn with_tiers(tiers: Vec<Box<dyn EstimationTier>>) -> Self {
        Self { tiers }
    }

    /// Runs the fallback chain over raw mesh bytes. Only structurally
    /// nonsensical input (an empty byte stream, an unusable density)
    /// errors; everything else degrades to a lower-fidelity estimate.
    pub fn estimate(
        &self,
        bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        if bytes.is_empty() {
            return Err(EstimateError::MalformedInput("empty byte stream"));
        }
        if !params.is_valid() {
            return Err(EstimateError::InvalidParameters(
                "material density must be positive and finite",
            ));
        }

        let mut last_error = None;
        for tier in &self.tiers {
            match tier.attempt(bytes, params) {
                Ok(breakdown) => {
                    info!(
                        method = %breakdown.method,
                        mass_g = breakdown.total_mass_g,
                        "estimate complete"
                    );
                    return Ok(breakdown);
                }
                Err(err) => {
                    warn!("{} tier failed: {err}", tier.method());
                    last_error = Some(err);
                }
            }
        }

        // Unreachable with the standard chain; the emergency tier
        // cannot fail.
        Err(last_error.unwrap_or(EstimateError::MalformedInput("no estimation tiers")))
    }
}

/// Tier 2: parse the mesh, repair it if it isn't watertight, and run
/// the decomposition model over the measured geometry.
pub struct LocalTier {
    model: Box<dyn DecompositionModel>,
}

impl LocalTier {
    pub fn new(model: Box<dyn DecompositionModel>) -> Self {
        Self { model }
    }
}

impl EstimationTier for LocalTier {
    fn method(&self) -> Method {
        Method::Local
    }

    fn attempt(
        &self,
        bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        let mut mesh = stl::parse(&mut SliceDeserializer::new(bytes), &Progress::new())?;
        mesh.normalize_units(params.length_unit);

        let mut summary =
            GeometrySummary::compute(&mesh).ok_or(EstimateError::DegenerateGeometry)?;

        if !summary.watertight {
            debug!("mesh is not watertight, attempting hole fill");
            let outcome = geometry::repair(&mesh);
            if !outcome.closed {
                warn!("hole fill left the mesh open, continuing with reduced accuracy");
            }

            // The repaired mesh gets a fresh summary; the old one is
            // invalid even if no loops were filled.
            if let Some(repaired) = GeometrySummary::compute(&outcome.mesh) {
                summary = repaired;
            }
        }

        debug!(
            model = self.model.name(),
            volume_cm3 = summary.volume.abs() / MM3_PER_CM3,
            watertight = summary.watertight,
            "geometry summary ready"
        );
        self.model.decompose(&summary, params)
    }
}

/// Tier 3: full triangle processing failed, but a truncated prefix of
/// the file may still yield extents. The bounding-box product with a
/// fixed partial-density factor stands in for the real decomposition.
pub struct BoundingBoxTier;

impl EstimationTier for BoundingBoxTier {
    fn method(&self) -> Method {
        Method::Heuristic
    }

    fn attempt(
        &self,
        bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        let mut mesh = stl::parse_lenient(&mut SliceDeserializer::new(bytes), &Progress::new())?;
        mesh.normalize_units(params.length_unit);

        let (min, max) = geometry::bounds(&mesh).ok_or(EstimateError::DegenerateGeometry)?;
        let extent = (max - min).cast::<f64>();
        let volume_cm3 = extent.x * extent.y * extent.z / MM3_PER_CM3;
        if !volume_cm3.is_finite() || volume_cm3 <= 0.0 {
            return Err(EstimateError::DegenerateGeometry);
        }

        let material_cm3 = volume_cm3 * HEURISTIC_DENSITY_FACTOR;
        let mass = material_cm3 * params.material_density as f64;

        Ok(VolumeBreakdown {
            total_volume_cm3: volume_cm3,
            shell_volume_cm3: 0.0,
            interior_volume_cm3: volume_cm3,
            material_volume_cm3: material_cm3,
            shell_mass_g: 0.0,
            interior_mass_g: mass,
            total_mass_g: mass,
            method: Method::Heuristic,
            warning: true,
        })
    }
}

/// Tier 4: nothing about the file was usable. Assume a nominal print
/// and flag the result so the caller can reject it or show a
/// disclaimer. This tier cannot fail.
pub struct EmergencyTier;

impl EstimationTier for EmergencyTier {
    fn method(&self) -> Method {
        Method::Emergency
    }

    fn attempt(
        &self,
        _bytes: &[u8],
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        let infill = params.clamped_infill() as f64;
        let material_cm3 = EMERGENCY_VOLUME_CM3 * infill;
        let mass = material_cm3 * params.material_density as f64;

        Ok(VolumeBreakdown {
            total_volume_cm3: EMERGENCY_VOLUME_CM3,
            shell_volume_cm3: 0.0,
            interior_volume_cm3: EMERGENCY_VOLUME_CM3,
            material_volume_cm3: material_cm3,
            shell_mass_g: 0.0,
            interior_mass_g: mass,
            total_mass_g: mass,
            method: Method::Emergency,
            warning: true,
        })
    }
}
