use std::path::PathBuf;

use json::JsonValue;

use crate::{
    datatypes::{ElementShape, InterfaceOrdering},
    error::FaultMeshError,
    geometry::GeoOptions,
    model::{
        AnalysisType, BoundaryCondition, BoundaryKind, Material, ModelDescription, NodeSetValue,
        Physics,
    },
};

const DEFAULT_OUTPUT_DIR: &str = "gemaFiles";

#[derive(Debug, Clone)]
pub struct SurfaceInput {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct GeometryInput {
    pub surfaces: Vec<SurfaceInput>,
    pub output: String,
    pub options: GeoOptions,
}

#[derive(Debug, Clone)]
pub struct MeshInput {
    pub file: String,
    pub element_shape: ElementShape,
    pub domain: String,
    pub cell_groups: Vec<String>,
    pub node_sets: Vec<(usize, String)>,
    pub discontinuities: Vec<String>,
    /// Required as soon as a discontinuity is listed
    pub interface_ordering: Option<InterfaceOrdering>,
}

/// Everything a run reads from its JSON input
#[derive(Debug, Clone)]
pub struct RunInput {
    pub problem_name: String,
    pub output_dir: PathBuf,
    pub geometry: Option<GeometryInput>,
    pub mesh: Option<MeshInput>,
    pub model: ModelDescription,
}

impl RunInput {
    pub fn load(input_file: &str) -> Result<RunInput, FaultMeshError> {
        let input_json = load_input_file(input_file)?;
        parse_input(&input_json)
    }

    /// `<output_dir>/<problem_name><suffix>`
    pub fn output_file(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", self.problem_name, suffix))
    }
}

fn missing(what: &str) -> FaultMeshError {
    FaultMeshError::Configuration(format!("Input json missing {what}"))
}

fn required_str(json: &JsonValue, key: &str, section: &str) -> Result<String, FaultMeshError> {
    json[key]
        .as_str()
        .map(|s| s.to_owned())
        .ok_or_else(|| missing(&format!("{key} field in {section}")))
}

fn required_f64(json: &JsonValue, key: &str, section: &str) -> Result<f64, FaultMeshError> {
    json[key]
        .as_f64()
        .ok_or_else(|| missing(&format!("{key} field in {section}")))
}

fn string_list(json: &JsonValue, key: &str, section: &str) -> Result<Vec<String>, FaultMeshError> {
    if json[key].is_null() {
        return Ok(Vec::new());
    }
    if !json[key].is_array() {
        return Err(FaultMeshError::Configuration(format!(
            "{key} in {section} must be a list"
        )));
    }
    json[key]
        .members()
        .map(|item| {
            item.as_str().map(|s| s.to_owned()).ok_or_else(|| {
                FaultMeshError::Configuration(format!("{key} in {section} must hold names"))
            })
        })
        .collect()
}

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object with the mandatory top level keys present
pub fn load_input_file(input_file: &str) -> Result<JsonValue, FaultMeshError> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(_err) => {
            return Err(FaultMeshError::Configuration(format!(
                "Unable to open input file {}",
                input_file
            )))
        }
    };

    let input_json = match json::parse(&file_string) {
        Ok(f) => f,
        Err(err) => {
            return Err(FaultMeshError::Configuration(format!(
                "Error in input file json: {err}"
            )))
        }
    };

    if !input_json.has_key("problem_name") {
        return Err(missing("problem_name field"));
    }
    if !input_json.has_key("dimension") {
        return Err(missing("dimension field"));
    }
    if !input_json.has_key("geometry") && !input_json.has_key("mesh") {
        return Err(missing("geometry or mesh section"));
    }

    Ok(input_json)
}

/// Builds the run input from an already loaded json document
pub fn parse_input(input_json: &JsonValue) -> Result<RunInput, FaultMeshError> {
    let problem_name = required_str(input_json, "problem_name", "input")?;
    let output_dir = input_json["output_dir"]
        .as_str()
        .unwrap_or(DEFAULT_OUTPUT_DIR)
        .to_owned();

    let dimension = match input_json["dimension"].as_usize() {
        Some(d) if d == 2 || d == 3 => d,
        _ => {
            return Err(FaultMeshError::Configuration(
                "dimension must be 2 or 3".to_owned(),
            ))
        }
    };

    let geometry = if input_json.has_key("geometry") {
        Some(parse_geometry(&input_json["geometry"])?)
    } else {
        None
    };

    let mesh = if input_json.has_key("mesh") {
        Some(parse_mesh(&input_json["mesh"])?)
    } else {
        None
    };

    let model = ModelDescription {
        dimension,
        materials: parse_materials(&input_json["materials"])?,
        physics: parse_physics(&input_json["physics"], dimension)?,
        boundary_conditions: parse_boundary_conditions(&input_json["boundary_conditions"], dimension)?,
    };

    if let Some(mesh) = mesh.as_ref() {
        for bc in model.boundary_conditions.iter() {
            for row in bc.node_values() {
                if !mesh.node_sets.iter().any(|(_, name)| *name == row.node_set) {
                    return Err(FaultMeshError::Configuration(format!(
                        "Boundary condition '{}' uses node set '{}' which is not listed in mesh.node_sets",
                        bc.id(),
                        row.node_set
                    )));
                }
            }
        }
    }

    Ok(RunInput {
        problem_name,
        output_dir: PathBuf::from(output_dir),
        geometry,
        mesh,
        model,
    })
}

fn parse_geometry(json: &JsonValue) -> Result<GeometryInput, FaultMeshError> {
    if !json["surfaces"].is_array() || json["surfaces"].is_empty() {
        return Err(missing("surfaces list in geometry section"));
    }

    let mut surfaces: Vec<SurfaceInput> = Vec::new();
    for surface in json["surfaces"].members() {
        surfaces.push(SurfaceInput {
            name: required_str(surface, "name", "geometry surface")?,
            path: required_str(surface, "path", "geometry surface")?,
        });
    }

    let characteristic_length_min = required_f64(json, "characteristic_length_min", "geometry section")?;
    let characteristic_length_max = required_f64(json, "characteristic_length_max", "geometry section")?;
    if characteristic_length_min > characteristic_length_max {
        return Err(FaultMeshError::Configuration(
            "characteristic_length_min is larger than characteristic_length_max".to_owned(),
        ));
    }

    Ok(GeometryInput {
        surfaces,
        output: required_str(json, "output", "geometry section")?,
        options: GeoOptions {
            bounding_box: json["bounding_box"].as_bool().unwrap_or(false),
            characteristic_length_min,
            characteristic_length_max,
        },
    })
}

fn parse_mesh(json: &JsonValue) -> Result<MeshInput, FaultMeshError> {
    let element_shape = ElementShape::parse(&required_str(json, "element_shape", "mesh section")?)?;

    let mut node_sets: Vec<(usize, String)> = Vec::new();
    for node_set in json["node_sets"].members() {
        let dim = node_set["dim"]
            .as_usize()
            .ok_or_else(|| missing("dim field in mesh node set"))?;
        node_sets.push((dim, required_str(node_set, "name", "mesh node set")?));
    }

    let discontinuities = string_list(json, "discontinuities", "mesh section")?;
    let interface_ordering = match json["interface_ordering"].as_str() {
        Some(name) => Some(InterfaceOrdering::parse(name)?),
        None => None,
    };
    if !discontinuities.is_empty() && interface_ordering.is_none() {
        return Err(FaultMeshError::Configuration(
            "interface_ordering (natural or reversed) is required when discontinuities are listed"
                .to_owned(),
        ));
    }

    let domain = required_str(json, "domain", "mesh section")?;
    let mut cell_groups = string_list(json, "cell_groups", "mesh section")?;
    if cell_groups.is_empty() {
        cell_groups.push(domain.clone());
    }

    Ok(MeshInput {
        file: required_str(json, "file", "mesh section")?,
        element_shape,
        domain,
        cell_groups,
        node_sets,
        discontinuities,
        interface_ordering,
    })
}

fn parse_materials(json: &JsonValue) -> Result<Vec<(String, Material)>, FaultMeshError> {
    let mut materials: Vec<(String, Material)> = Vec::new();
    for (name, material_json) in json.entries() {
        let material_type = required_str(material_json, "materialType", &format!("material {name}"))?;
        let material = Material::build(&material_type, |id| material_json[id].as_f64())?;
        materials.push((name.to_owned(), material));
    }
    Ok(materials)
}

fn parse_physics(json: &JsonValue, dimension: usize) -> Result<Vec<Physics>, FaultMeshError> {
    let mut physics: Vec<Physics> = Vec::new();
    for physics_json in json.members() {
        let default_analysis = if dimension == 3 { "3D" } else { "PlaneStrain" };
        let analysis = AnalysisType::parse(physics_json["analysis"].as_str().unwrap_or(default_analysis))?;

        let entry = match required_str(physics_json, "type", "physics entry")?.as_str() {
            "mechanical" => Physics::Mechanical(analysis),
            "hydromechanical" => Physics::HydroMechanical(analysis),
            other => {
                return Err(FaultMeshError::Configuration(format!(
                    "Unknown physics type '{other}'. Expected mechanical or hydromechanical"
                )))
            }
        };
        physics.push(entry);
    }
    Ok(physics)
}

fn parse_boundary_conditions(
    json: &JsonValue,
    dimension: usize,
) -> Result<Vec<BoundaryCondition>, FaultMeshError> {
    let mut conditions: Vec<BoundaryCondition> = Vec::new();
    for bc_json in json.members() {
        let id = required_str(bc_json, "id", "boundary condition")?;
        let kind = BoundaryKind::parse(
            &required_str(bc_json, "type", &format!("boundary condition {id}"))?,
            dimension,
        )?;

        let mut node_values: Vec<NodeSetValue> = Vec::new();
        for row in bc_json["values"].members() {
            let node_set = required_str(row, "node_set", &format!("boundary condition {id}"))?;
            let values: Vec<f64> = if row["value"].is_array() {
                row["value"].members().filter_map(|v| v.as_f64()).collect()
            } else {
                row["value"].as_f64().into_iter().collect()
            };
            node_values.push(NodeSetValue { node_set, values });
        }

        conditions.push(BoundaryCondition::new(&id, kind, node_values)?);
    }
    Ok(conditions)
}
