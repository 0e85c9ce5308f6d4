use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    datatypes::{InterfaceElement, PhysicalGroup},
    error::FaultMeshError,
    mesher::MeshQuery,
    model::{bc_variable_info, parameter_info, ModelDescription},
};

const RULE: &str = "-------------------------------------------------------------";
const INTERFACE_NAME: &str = "int2dl4";
const INTERFACE_INTEGRATION_RULE: &str = "N2";

/// Physical groups that make up the exported mesh
#[derive(Debug, Clone)]
pub struct MeshLayout {
    pub dimension: usize,
    pub domain: PhysicalGroup,
    pub cell_groups: Vec<PhysicalGroup>,
    pub node_sets: Vec<PhysicalGroup>,
}

/// Interface elements built for one discontinuity group
#[derive(Debug, Clone)]
pub struct InterfaceTable {
    pub group: PhysicalGroup,
    pub elements: Vec<InterfaceElement>,
}

/// One `meshData` cell table and its integration rule
#[derive(Debug, Clone, PartialEq)]
pub struct CellTable {
    pub cell_type: String,
    pub table: String,
    pub integration_rule: String,
}

fn create_file(path: &Path) -> Result<BufWriter<File>, FaultMeshError> {
    match File::create(path) {
        Ok(f) => Ok(BufWriter::new(f)),
        Err(err) => Err(FaultMeshError::Writer(format!(
            "Failed to create {}: {err}",
            path.display()
        ))),
    }
}

/// Formats a float like `%.8e` with a signed, two digit exponent
fn scientific(value: f64) -> String {
    let formatted = format!("{:.8e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

fn lua_number(value: f64) -> String {
    format!("{:?}", value)
}

fn close_table(out: &mut impl Write, name: &str) -> Result<(), FaultMeshError> {
    write!(out, "}}\n\nmeshData['{name}'] = {name}\n")?;
    Ok(())
}

/// Writes the mesh definition file read by the solver
///
/// # Arguments
/// * `path` - Output file, truncated if it exists
/// * `mesh` - The meshed model
/// * `layout` - Domain, cell groups and node sets to export
/// * `interfaces` - Interface elements per discontinuity
///
/// # Returns
/// The cell tables written, in file order
pub fn write_mesh_file<M: MeshQuery>(
    path: &Path,
    mesh: &M,
    layout: &MeshLayout,
    interfaces: &[InterfaceTable],
) -> Result<Vec<CellTable>, FaultMeshError> {
    let mut out = create_file(path)?;
    let mut cell_tables: Vec<CellTable> = Vec::new();

    write!(out, "{RULE}\n-- Mesh definition\n{RULE}\n")?;
    write!(out, "\n-- Initialize the mesh data table\n")?;
    write!(out, "\nlocal meshData = {{}}\n")?;

    // nodes
    let domain = &layout.domain;
    let nodes = mesh.nodes_for_physical_group(domain.dim, domain.tag);
    if nodes.is_empty() {
        return Err(FaultMeshError::Configuration(format!(
            "Domain group '{}' has no nodes",
            domain.name
        )));
    }
    if nodes.iter().enumerate().any(|(i, (id, _))| *id != i + 1) {
        log::warn!(
            "node ids of '{}' are not contiguous from 1, table positions will not match mesh ids",
            domain.name
        );
    }

    write!(out, "\n-- Nodes coordinates\n\nlocal nodes = {{\n")?;
    for (i, (_, vertex)) in nodes.iter().enumerate() {
        if layout.dimension == 3 {
            writeln!(
                out,
                "    {{ {}, {}, {} }}, -- {}",
                scientific(vertex.x),
                scientific(vertex.y),
                scientific(vertex.z),
                i + 1
            )?;
        } else {
            writeln!(
                out,
                "    {{ {}, {} }}, -- {}",
                scientific(vertex.x),
                scientific(vertex.y),
                i + 1
            )?;
        }
    }
    write!(out, "}}\n\nmeshData['nodes'] = nodes\n")?;

    // continuum elements
    for group in layout.cell_groups.iter() {
        let entities = mesh.entities_for_physical_group(group.dim, group.tag);
        for kind in mesh.element_kinds_for_physical_group(group.dim, group.tag) {
            let table = format!("{}_{}", kind.gema_name(), group.name);
            write!(
                out,
                "\n-- Mesh {} elements of {}\n\nlocal {table} = {{\n",
                kind.gema_name(),
                group.name
            )?;

            for entity in entities.iter() {
                for element in mesh.elements_for_entity(group.dim, *entity) {
                    if element.kind != kind {
                        continue;
                    }
                    let connectivity: Vec<String> =
                        element.nodes.iter().map(|n| n.to_string()).collect();
                    writeln!(out, "    {{{}}},", connectivity.join(", "))?;
                }
            }
            close_table(&mut out, &table)?;

            cell_tables.push(CellTable {
                cell_type: kind.gema_name().to_owned(),
                table,
                integration_rule: kind.integration_order().to_string(),
            });
        }
    }

    // interface elements
    for interface in interfaces.iter() {
        let table = format!("{INTERFACE_NAME}_{}", interface.group.name);
        write!(
            out,
            "\n-- Mesh elements of {}\n\nlocal {table} = {{\n",
            interface.group.name
        )?;
        for (i, element) in interface.elements.iter().enumerate() {
            let [a, b, c, d] = element.nodes;
            writeln!(out, "    {{ {a}, {b}, {c}, {d} }}, -- {}", i + 1)?;
        }
        close_table(&mut out, &table)?;

        cell_tables.push(CellTable {
            cell_type: INTERFACE_NAME.to_owned(),
            table,
            integration_rule: format!("'{INTERFACE_INTEGRATION_RULE}'"),
        });
    }

    // node sets
    for node_set in layout.node_sets.iter() {
        let table = format!("nodeList_{}", node_set.name);
        write!(
            out,
            "\n-- Node list of {}\n\nlocal {table} = {{\n",
            node_set.name
        )?;
        for (id, _) in mesh.nodes_for_physical_group(node_set.dim, node_set.tag) {
            writeln!(out, "     {id},")?;
        }
        close_table(&mut out, &table)?;
    }

    write!(
        out,
        "\n-- Element types and integration rules\n\nmeshData['elementTypes'] = {{\n"
    )?;
    for cell in cell_tables.iter() {
        writeln!(
            out,
            "    {{ cellType = '{}', cellList = '{}', intOrder = {} }},",
            cell.cell_type, cell.table, cell.integration_rule
        )?;
    }
    write!(out, "}}\n")?;

    write!(out, "\nreturn meshData")?;
    out.flush()?;

    log::info!(
        "wrote {} nodes and {} cell tables to {}",
        nodes.len(),
        cell_tables.len(),
        path.display()
    );

    Ok(cell_tables)
}

/// Writes materials, state variables and boundary conditions
///
/// # Arguments
/// * `path` - Output file, truncated if it exists
/// * `model` - The model description
pub fn write_model_file(path: &Path, model: &ModelDescription) -> Result<(), FaultMeshError> {
    let mut out = create_file(path)?;

    // materials
    write!(out, "{RULE}\n--  Cell properties\n{RULE}\n")?;
    write!(
        out,
        "PropertySet\n{{\n  id= 'MatProp',\n  typeName  = 'GemaPropertySet',\n  description = 'Material properties',\n"
    )?;

    let mut property_ids: Vec<&'static str> = Vec::new();
    for (_, material) in model.materials.iter() {
        for (id, _) in material.parameters() {
            if !property_ids.contains(&id) {
                property_ids.push(id);
            }
        }
    }

    write!(out, "  properties = {{\n")?;
    for id in property_ids.iter() {
        let (description, unit) = parameter_info(id);
        writeln!(
            out,
            "    {{id = '{id}',  description = '{description}',  unit = '{unit}'}},"
        )?;
    }
    write!(out, "  }},\n  values = {{\n")?;
    for (name, material) in model.materials.iter() {
        let values: Vec<String> = material
            .parameters()
            .iter()
            .map(|(id, value)| format!("{id} = {}", lua_number(*value)))
            .collect();
        writeln!(
            out,
            "    {{id = '{name}', matType = '{}', {}}},",
            material.type_name(),
            values.join(", ")
        )?;
    }
    write!(out, "  }}\n}}\n\n")?;

    // state variables
    write!(out, "{RULE}\n--  State variables\n{RULE}\n")?;
    for physics in model.physics.iter() {
        writeln!(out, "-- {}", physics.name())?;
    }
    for variable in model.state_variables() {
        writeln!(
            out,
            "StateVar{{id = '{}', dim = {}, description = '{}', unit = '{}', format = '8.4f', groupName = '{}'}}",
            variable.id, variable.dim, variable.description, variable.unit, variable.group
        )?;
    }
    writeln!(out)?;

    // boundary conditions
    if !model.boundary_conditions.is_empty() {
        write!(out, "{RULE}\n--  Boundary conditions\n{RULE}\n")?;
    }
    for bc in model.boundary_conditions.iter() {
        write!(
            out,
            "BoundaryCondition {{\n  id = '{}',\n  type = '{}',\n  mesh = 'mesh',\n\n  properties = {{\n",
            bc.id(),
            bc.kind().type_name()
        )?;
        for id in bc.kind().parameter_ids() {
            let (description, unit, default) = bc_variable_info(id);
            writeln!(
                out,
                "    {{id = '{id}',  description = '{description}',  unit = '{unit}',  defVal = '{}'}},",
                default
            )?;
        }
        write!(out, "  }},\n\n  nodeValues = {{\n")?;
        for row in bc.node_values() {
            write!(out, "    {{'{}',", row.node_set)?;
            for value in row.values.iter() {
                write!(out, "  {},", lua_number(*value))?;
            }
            write!(out, "}},\n")?;
        }
        write!(out, "  }}\n}}\n\n")?;
    }

    out.flush()?;
    log::info!("wrote model description to {}", path.display());

    Ok(())
}

/// Writes the discontinuity set declaration
pub fn write_discontinuity_set(path: &Path) -> Result<(), FaultMeshError> {
    let mut out = create_file(path)?;
    write!(out, "{RULE}\n--  Discontinuity Set\n{RULE}\n")?;
    write!(
        out,
        "DiscontinuitySet\n{{\n  id= 'DSet',\n  description = 'Discontinuity set',\n  mesh = 'mesh',\n  addElements = true\n}}\n"
    )?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mesher::{tests::TWO_QUADS, GmshMesh},
        model::{AnalysisType, BoundaryCondition, BoundaryKind, Material, NodeSetValue, Physics},
    };
    use tempfile::tempdir;

    fn group(mesh: &GmshMesh, dim: usize, name: &str) -> PhysicalGroup {
        mesh.physical_group(dim, name).unwrap()
    }

    #[test]
    fn scientific_matches_printf_style() {
        assert_eq!(scientific(1.0), "1.00000000e+00");
        assert_eq!(scientific(-1250.5), "-1.25050000e+03");
        assert_eq!(scientific(0.000125), "1.25000000e-04");
        assert_eq!(scientific(0.0), "0.00000000e+00");
    }

    #[test]
    fn mesh_file_lists_nodes_cells_interfaces_and_node_sets() {
        let mesh = GmshMesh::parse(TWO_QUADS).unwrap();
        let layout = MeshLayout {
            dimension: 2,
            domain: group(&mesh, 2, "ContinuumDomain"),
            cell_groups: vec![group(&mesh, 2, "ContinuumDomain"), group(&mesh, 2, "Rock")],
            node_sets: vec![group(&mesh, 1, "leftBorder")],
        };
        let interfaces = vec![InterfaceTable {
            group: group(&mesh, 1, "Fault"),
            elements: vec![InterfaceElement { nodes: [2, 3, 6, 5] }],
        }];

        let dir = tempdir().unwrap();
        let path = dir.path().join("P_mesh.lua");
        let tables = write_mesh_file(&path, &mesh, &layout, &interfaces).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();

        assert!(contents.starts_with(
            "-------------------------------------------------------------\n-- Mesh definition\n"
        ));
        assert!(contents.contains("\nlocal meshData = {}\n"));
        assert!(contents.contains("    { 0.00000000e+00, 1.00000000e+00 }, -- 4\n"));
        assert!(contents.contains(
            "\n-- Mesh quad4 elements of Rock\n\nlocal quad4_Rock = {\n    {1, 2, 3, 4},\n    {5, 7, 8, 6},\n}\n\nmeshData['quad4_Rock'] = quad4_Rock\n"
        ));
        assert!(contents.contains(
            "local int2dl4_Fault = {\n    { 2, 3, 6, 5 }, -- 1\n}\n\nmeshData['int2dl4_Fault'] = int2dl4_Fault\n"
        ));
        assert!(contents.contains("local nodeList_leftBorder = {\n     1,\n     4,\n}\n"));
        assert!(contents.contains("{ cellType = 'int2dl4', cellList = 'int2dl4_Fault', intOrder = 'N2' },"));
        assert!(contents.ends_with("\nreturn meshData"));

        let names: Vec<&str> = tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["quad4_ContinuumDomain", "quad4_Rock", "int2dl4_Fault"]);
    }

    #[test]
    fn rewriting_truncates_previous_output() {
        let mesh = GmshMesh::parse(TWO_QUADS).unwrap();
        let layout = MeshLayout {
            dimension: 2,
            domain: group(&mesh, 2, "Rock"),
            cell_groups: Vec::new(),
            node_sets: Vec::new(),
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("P_mesh.lua");
        std::fs::write(&path, "x".repeat(10_000)).unwrap();

        write_mesh_file(&path, &mesh, &layout, &[]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("xxx"));
        assert_eq!(contents.matches(" -- ").count(), 8);
    }

    #[test]
    fn model_file_declares_properties_state_vars_and_conditions() {
        let model = ModelDescription {
            dimension: 2,
            materials: vec![
                (
                    "rock".to_owned(),
                    Material::Elastic {
                        e: 1.0e7,
                        nu: 0.25,
                    },
                ),
                (
                    "fault".to_owned(),
                    Material::ElasticInterface {
                        kn: 1.0e6,
                        ks: 1.0e6,
                        gap: 0.0,
                        lkt: 0.0,
                        lkb: 0.0,
                        iopen: 0.0,
                    },
                ),
            ],
            physics: vec![Physics::HydroMechanical(AnalysisType::PlaneStrain)],
            boundary_conditions: vec![BoundaryCondition::new(
                "bcDisp",
                BoundaryKind::NodeDisplacement { dim: 2 },
                vec![NodeSetValue {
                    node_set: "bottomBorder".to_owned(),
                    values: vec![-9999.0, 0.0],
                }],
            )
            .unwrap()],
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("P_model.lua");
        write_model_file(&path, &model).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();

        assert!(contents.contains("PropertySet\n{\n  id= 'MatProp',\n  typeName  = 'GemaPropertySet',\n"));
        assert!(contents.contains("    {id = 'E',  description = 'Elasticity modulus',  unit = 'kPa'},\n"));
        assert!(contents.contains("    {id = 'rock', matType = 'elastic', E = 10000000.0, nu = 0.25},\n"));
        assert!(contents.contains("-- CoupledHMFemPhysics.PlaneStrain\n"));
        assert!(contents.contains(
            "StateVar{id = 'u', dim = 2, description = 'Displacements in the X and Y directions', unit = 'm', format = '8.4f', groupName = 'mechanic'}\n"
        ));
        assert!(contents.contains("StateVar{id = 'p', dim = 1,"));
        assert!(contents.contains(
            "    {id = 'ux',  description = 'Fixed node displacement in the X direction',  unit = 'm',  defVal = '-9999'},\n"
        ));
        assert!(contents.contains("    {'bottomBorder',  -9999.0,  0.0,},\n"));
    }

    #[test]
    fn discontinuity_set_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("P_discontinuitySet.lua");
        write_discontinuity_set(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("DiscontinuitySet\n{\n  id= 'DSet',"));
        assert!(contents.contains("addElements = true\n}"));
    }
}
