use serde::{Deserialize, Serialize};

use crate::units::LengthUnit;

/// Slicers can't reliably produce parts under 10% dense, so anything
/// lower is bumped up rather than rejected.
pub const MIN_INFILL_FRACTION: f32 = 0.10;

/// Print settings used to split a solid into shell and infill
/// material. Callers usually start from `Default` and override a few
/// fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PrintParameters {
    /// Interior density, 0.0..=1.0. Clamped to [0.10, 1.0] before use.
    pub infill_fraction: f32,
    /// Extrusion width of a single perimeter pass, in mm.
    pub wall_thickness: f32,
    /// Layer height in mm.
    pub layer_height: f32,
    /// Solid cap layers on the top and bottom of the print.
    pub top_bottom_layer_count: u32,
    /// Vertical wall passes around the outside of each layer.
    pub perimeter_count: u32,
    /// Material density in g/cm³.
    pub material_density: f32,
    /// Unit of the incoming mesh coordinates.
    pub length_unit: LengthUnit,
}

impl PrintParameters {
    /// Infill fraction clamped into its usable range.
    pub fn clamped_infill(&self) -> f32 {
        self.infill_fraction.clamp(MIN_INFILL_FRACTION, 1.0)
    }

    /// True when the parameters can produce a meaningful estimate after
    /// clamping. Density can't be fixed up by clamping, so it is the
    /// one field that can actually be invalid.
    pub fn is_valid(&self) -> bool {
        self.material_density.is_finite()
            && self.material_density > 0.0
            && self.infill_fraction.is_finite()
    }
}

impl Default for PrintParameters {
    fn default() -> Self {
        Self {
            infill_fraction: 0.20,
            wall_thickness: 0.6,
            layer_height: 0.2,
            top_bottom_layer_count: 3,
            perimeter_count: 2,
            material_density: 1.24,
            length_unit: LengthUnit::Millimeter,
        }
    }
}
