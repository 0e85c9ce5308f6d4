use clap::{Parser, Subcommand};
use log::LevelFilter;

mod datatypes;
mod discontinuity;
mod error;
mod geometry;
mod input;
mod mesher;
mod model;
mod surface;
mod writer;

use crate::{
    datatypes::PhysicalGroup,
    discontinuity::DiscontinuityCurve,
    error::FaultMeshError,
    geometry::Geometry,
    input::RunInput,
    mesher::{GmshMesh, MeshQuery},
    writer::{InterfaceTable, MeshLayout},
};

/// Builds gmsh geometries from triangulated patches and exports meshes with
/// explicit fault interface elements
#[derive(Parser)]
#[command(name = "faultmesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fault-aware mesh preparation for GeMA", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the OFF patches of the input into a gmsh script
    Geometry {
        input: String,
        /// Also run gmsh on the written script
        #[arg(long)]
        mesh: bool,
    },
    /// Read the mesh of the input and write the GeMA Lua files
    Export { input: String },
}

fn init_logger(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run_geometry(input_file: &str, mesh: bool) -> Result<(), FaultMeshError> {
    let input = RunInput::load(input_file)?;
    let settings = input.geometry.as_ref().ok_or_else(|| {
        FaultMeshError::Configuration(format!("{input_file} has no geometry section"))
    })?;

    let mut geometry = Geometry::new();
    for surface in settings.surfaces.iter() {
        geometry.load_surface(&surface.path, &surface.name)?;
    }
    geometry.write_geo(&settings.output, &settings.options)?;

    if mesh {
        let mesh_file = match input.mesh.as_ref() {
            Some(m) => m.file.clone(),
            None => format!("{}.msh", settings.output.trim_end_matches(".geo")),
        };
        mesher::run_gmsh(&settings.output, &mesh_file, input.model.dimension)?;
    }

    Ok(())
}

fn resolve_group(mesh: &GmshMesh, dim: usize, name: &str) -> Result<PhysicalGroup, FaultMeshError> {
    mesh.physical_group(dim, name).ok_or_else(|| {
        FaultMeshError::Configuration(format!(
            "Physical group '{name}' of dimension {dim} not found in the mesh"
        ))
    })
}

fn run_export(input_file: &str) -> Result<(), FaultMeshError> {
    let input = RunInput::load(input_file)?;
    let settings = input.mesh.as_ref().ok_or_else(|| {
        FaultMeshError::Configuration(format!("{input_file} has no mesh section"))
    })?;

    let mesh = GmshMesh::load(&settings.file)?;
    let dim = input.model.dimension;

    let layout = MeshLayout {
        dimension: dim,
        domain: resolve_group(&mesh, dim, &settings.domain)?,
        cell_groups: settings
            .cell_groups
            .iter()
            .map(|name| resolve_group(&mesh, dim, name))
            .collect::<Result<Vec<_>, _>>()?,
        node_sets: settings
            .node_sets
            .iter()
            .map(|(set_dim, name)| resolve_group(&mesh, *set_dim, name))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut interfaces: Vec<InterfaceTable> = Vec::new();
    if let Some(ordering) = settings.interface_ordering {
        for name in settings.discontinuities.iter() {
            let group = resolve_group(&mesh, 1, name)?;
            let curve = DiscontinuityCurve::from_physical_group(&mesh, &group)?;
            let elements = discontinuity::create_interface_elements(
                &mesh,
                &curve,
                settings.element_shape,
                ordering,
            )?;
            interfaces.push(InterfaceTable { group, elements });
        }
    }

    if let Err(err) = std::fs::create_dir_all(&input.output_dir) {
        return Err(FaultMeshError::Writer(format!(
            "Unable to create {}: {err}",
            input.output_dir.display()
        )));
    }

    writer::write_mesh_file(&input.output_file("_mesh.lua"), &mesh, &layout, &interfaces)?;
    writer::write_model_file(&input.output_file("_model.lua"), &input.model)?;
    if !interfaces.is_empty() {
        writer::write_discontinuity_set(&input.output_file("_discontinuitySet.lua"))?;
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    let result = match cli.command {
        Commands::Geometry { input, mesh } => run_geometry(&input, mesh),
        Commands::Export { input } => run_export(&input),
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1)
    }
}
