use std::{path::PathBuf, time::Duration};

use clap::Parser;

use common::{config::PrintParameters, units::LengthUnit};
use estimator::{EstimatorConfig, RemoteConfig};

#[derive(Debug, Parser)]
/// Estimates the material volume and weight needed to print a model.
pub struct Args {
    /// Path to a .stl file.
    pub mesh: PathBuf,

    #[arg(long, default_value_t = 20.0)]
    /// Interior infill percentage, 0-100. Values under 10% are bumped
    /// up to 10%.
    pub infill: f32,
    #[arg(long, default_value_t = 1.24)]
    /// Material density in g/cm³ (1.24 is PLA).
    pub density: f32,
    #[arg(long, default_value = "mm")]
    /// Unit of the mesh coordinates: mm, cm, or in. Anything else is
    /// treated as mm.
    pub unit: String,
    #[arg(long, default_value_t = 0.6)]
    /// Extrusion width of one perimeter pass in mm.
    pub wall_thickness: f32,
    #[arg(long, default_value_t = 0.2)]
    /// Layer height in mm.
    pub layer_height: f32,
    #[arg(long, default_value_t = 3)]
    /// Solid cap layers on the top and bottom of the print.
    pub top_bottom_layers: u32,
    #[arg(long, default_value_t = 2)]
    /// Vertical wall passes around the outside of each layer.
    pub perimeters: u32,

    #[arg(long)]
    /// Url of a remote estimator service to try before computing
    /// locally, e.g. http://localhost:8000/estimate-weight.
    pub remote_url: Option<String>,
    #[arg(long, default_value_t = 30)]
    /// Remote request timeout in seconds.
    pub timeout: u64,

    #[arg(long)]
    /// Print the breakdown as json instead of a table.
    pub json: bool,
}

impl Args {
    pub fn print_parameters(&self) -> PrintParameters {
        PrintParameters {
            infill_fraction: self.infill / 100.0,
            wall_thickness: self.wall_thickness,
            layer_height: self.layer_height,
            top_bottom_layer_count: self.top_bottom_layers,
            perimeter_count: self.perimeters,
            material_density: self.density,
            length_unit: self.unit.parse().unwrap_or(LengthUnit::Millimeter),
        }
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            remote: self.remote_url.as_ref().map(|url| RemoteConfig {
                url: url.clone(),
                timeout: Duration::from_secs(self.timeout),
            }),
        }
    }
}
