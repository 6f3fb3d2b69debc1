use std::{
    fs,
    io::{stdout, Write},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use args::Args;
use estimator::{geometry, Estimator};
use mesh_format::load_mesh;

mod args;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    let params = args.print_parameters();

    let bytes = fs::read(&args.mesh)
        .with_context(|| format!("reading {}", args.mesh.display()))?;
    let ext = (args.mesh.extension())
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stl".to_owned());

    // Parse once up front for the summary line; big files get a
    // progress readout while the worker thread chews through them.
    let (progress, join) = load_mesh(bytes.clone(), &ext);
    while !progress.is_finished() {
        print!("\rLoading... {:.0}%", progress.fraction() * 100.0);
        stdout().flush()?;
        thread::sleep(Duration::from_millis(50));
    }
    print!("\r");

    match join.join().expect("loader thread panicked") {
        Ok(mut mesh) => {
            mesh.normalize_units(params.length_unit);
            println!(
                "Loaded `{}`. {{ vert: {}, face: {}, watertight: {} }}",
                args.mesh.file_name().unwrap_or_default().to_string_lossy(),
                mesh.verts.len(),
                mesh.faces.len(),
                geometry::is_watertight(&mesh),
            );
        }
        Err(err) => println!("Mesh did not parse cleanly ({err}), falling back."),
    }

    let estimator = Estimator::new(args.estimator_config());
    let breakdown = estimator.estimate(&bytes, &params)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!();
    println!("Method:          {}", breakdown.method);
    println!("Total volume:    {:.1} cm³", breakdown.total_volume_cm3);
    println!("Shell volume:    {:.1} cm³", breakdown.shell_volume_cm3);
    println!("Interior volume: {:.1} cm³", breakdown.interior_volume_cm3);
    println!("Material volume: {:.1} cm³", breakdown.material_volume_cm3);
    println!("Shell mass:      {:.1} g", breakdown.shell_mass_g);
    println!("Interior mass:   {:.1} g", breakdown.interior_mass_g);
    println!("Total mass:      {:.1} g", breakdown.total_mass_g);
    if breakdown.warning {
        println!("\nWarning: low-confidence estimate, treat as a rough guess.");
    }

    Ok(())
}
