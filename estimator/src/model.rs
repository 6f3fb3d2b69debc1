//! Splits a solid's volume into a 100%-dense shell and an
//! infill-percentage-dense interior, then converts material volume to
//! mass. The formula lives behind [`DecompositionModel`] so alternative
//! heuristics can be swapped in and compared against real slicer output
//! without touching the orchestrator or the geometry engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use common::{config::PrintParameters, units::MM3_PER_CM3};

use crate::{error::EstimateError, geometry::GeometrySummary};

/// Area-based shell estimates diverge on elongated or high-surface-area
/// shapes, so shell volume is never allowed to exceed this fraction of
/// the total.
pub const SHELL_CEILING_FRACTION: f64 = 0.15;

/// Which estimation tier produced a result.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Remote,
    Local,
    Heuristic,
    Emergency,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Remote => "remote",
            Method::Local => "local",
            Method::Heuristic => "heuristic",
            Method::Emergency => "emergency",
        })
    }
}

/// Result of one estimation request. Volumes are reported in cm³ and
/// masses in grams; built once and never mutated.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct VolumeBreakdown {
    pub total_volume_cm3: f64,
    pub shell_volume_cm3: f64,
    pub interior_volume_cm3: f64,
    pub material_volume_cm3: f64,
    pub shell_mass_g: f64,
    pub interior_mass_g: f64,
    pub total_mass_g: f64,
    pub method: Method,
    /// Set when the numbers come from degraded input (non-watertight
    /// mesh, fallback heuristics) and should be shown with a disclaimer.
    pub warning: bool,
}

pub trait DecompositionModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn decompose(
        &self,
        summary: &GeometrySummary,
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError>;
}

/// Default decomposition: every perimeter pass and every top/bottom cap
/// layer lays down one surface-area-thick sheet of material.
///
/// `S = A × (perimeters × wall_thickness + cap_layers × layer_height)`,
/// clamped so a small solid can't have a shell thicker than itself and
/// a large one can't be dominated by the area term. The interior gets
/// the user's infill fraction; the shell is always solid.
pub struct WallAndCapModel;

impl DecompositionModel for WallAndCapModel {
    fn name(&self) -> &'static str {
        "wall-and-cap"
    }

    fn decompose(
        &self,
        summary: &GeometrySummary,
        params: &PrintParameters,
    ) -> Result<VolumeBreakdown, EstimateError> {
        if !params.is_valid() {
            return Err(EstimateError::InvalidParameters(
                "material density must be positive and finite",
            ));
        }

        let volume = summary.volume.abs();
        if !volume.is_finite() || volume <= 0.0 {
            return Err(EstimateError::DegenerateGeometry);
        }

        let thickness_per_pass = params.perimeter_count as f64 * params.wall_thickness as f64
            + params.top_bottom_layer_count as f64 * params.layer_height as f64;
        let raw_shell = summary.surface_area * thickness_per_pass;
        let shell = raw_shell.min(volume * SHELL_CEILING_FRACTION).min(volume);

        let interior = (volume - shell).max(0.0);
        let infill = params.clamped_infill() as f64;
        let material = shell + interior * infill;

        // Density is g/cm³, geometry is mm³; convert at this boundary.
        let density = params.material_density as f64;
        let shell_mass = shell / MM3_PER_CM3 * density;
        let interior_mass = interior * infill / MM3_PER_CM3 * density;

        Ok(VolumeBreakdown {
            total_volume_cm3: volume / MM3_PER_CM3,
            shell_volume_cm3: shell / MM3_PER_CM3,
            interior_volume_cm3: interior / MM3_PER_CM3,
            material_volume_cm3: material / MM3_PER_CM3,
            shell_mass_g: shell_mass,
            interior_mass_g: interior_mass,
            total_mass_g: shell_mass + interior_mass,
            method: Method::Local,
            warning: !summary.watertight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;
    use crate::test_util::cube;

    fn summary(side: f32) -> GeometrySummary {
        geometry::GeometrySummary::compute(&cube(side)).unwrap()
    }

    fn params(infill: f32) -> PrintParameters {
        PrintParameters {
            infill_fraction: infill,
            ..Default::default()
        }
    }

    #[test]
    fn hundred_millimeter_cube() {
        let breakdown = WallAndCapModel
            .decompose(&summary(100.0), &params(0.2))
            .unwrap();

        // 1,000,000 mm³ reported as 1000 cm³.
        assert!((breakdown.total_volume_cm3 - 1000.0).abs() < 1.0);

        // A = 60,000 mm², passes = 2×0.6 + 3×0.2 = 1.8 mm → 108 cm³,
        // under the 15% ceiling.
        assert!((breakdown.shell_volume_cm3 - 108.0).abs() < 0.5);
        assert!((breakdown.interior_volume_cm3 - 892.0).abs() < 0.5);
        assert!(
            (breakdown.material_volume_cm3 - (108.0 + 892.0 * 0.2)).abs() < 0.5,
            "material: {}",
            breakdown.material_volume_cm3
        );
        assert!((breakdown.total_mass_g - breakdown.material_volume_cm3 * 1.24).abs() < 0.01);
        assert_eq!(breakdown.method, Method::Local);
        assert!(!breakdown.warning);
    }

    #[test]
    fn shell_is_clamped_for_tiny_solids() {
        // Unit cube: raw shell estimate (10.8 mm³) dwarfs the 1 mm³
        // volume and must be clamped to the ceiling fraction.
        let breakdown = WallAndCapModel
            .decompose(&summary(1.0), &params(0.2))
            .unwrap();

        let total = breakdown.total_volume_cm3;
        assert!(breakdown.shell_volume_cm3 <= total);
        assert!(breakdown.shell_volume_cm3 <= total * SHELL_CEILING_FRACTION + 1e-9);
    }

    #[test]
    fn material_is_monotone_in_infill() {
        let summary = summary(100.0);
        let mut last = 0.0;
        for percent in 0..=100 {
            let breakdown = WallAndCapModel
                .decompose(&summary, &params(percent as f32 / 100.0))
                .unwrap();
            assert!(
                breakdown.material_volume_cm3 >= last,
                "material dropped at {percent}%"
            );
            last = breakdown.material_volume_cm3;
        }
    }

    #[test]
    fn full_infill_uses_the_whole_volume() {
        let breakdown = WallAndCapModel
            .decompose(&summary(100.0), &params(1.0))
            .unwrap();
        assert!((breakdown.material_volume_cm3 - breakdown.total_volume_cm3).abs() < 1e-6);
    }

    #[test]
    fn infill_below_minimum_is_clamped() {
        let low = WallAndCapModel
            .decompose(&summary(100.0), &params(0.01))
            .unwrap();
        let min = WallAndCapModel
            .decompose(&summary(100.0), &params(0.10))
            .unwrap();
        assert_eq!(low.material_volume_cm3, min.material_volume_cm3);
    }

    #[test]
    fn zero_volume_is_an_error() {
        let mut degenerate = summary(1.0);
        degenerate.volume = 0.0;
        assert_eq!(
            WallAndCapModel.decompose(&degenerate, &params(0.2)),
            Err(EstimateError::DegenerateGeometry)
        );
    }

    #[test]
    fn negative_density_is_rejected() {
        let params = PrintParameters {
            material_density: -1.0,
            ..Default::default()
        };
        assert_eq!(
            WallAndCapModel.decompose(&summary(10.0), &params),
            Err(EstimateError::InvalidParameters(
                "material density must be positive and finite"
            ))
        );
    }
}
