use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    datatypes::{ElementKind, PhysicalGroup, Vertex},
    error::FaultMeshError,
};

/// Queries the core needs from a mesh generator. Entities and physical
/// groups are addressed by `(dim, tag)` the same way gmsh does.
pub trait MeshQuery {
    /// Resolves a named physical group of the given dimension
    fn physical_group(&self, dim: usize, name: &str) -> Option<PhysicalGroup>;

    fn physical_name(&self, dim: usize, tag: usize) -> Option<&str>;

    /// Entity tags belonging to a physical group, in ascending order
    fn entities_for_physical_group(&self, dim: usize, tag: usize) -> Vec<usize>;

    /// Sorted node ids of an entity, including the nodes on its boundary
    fn nodes_for_entity(&self, dim: usize, entity: usize) -> Vec<usize>;

    fn elements_for_entity(&self, dim: usize, entity: usize) -> Vec<&MeshElement>;

    fn node(&self, id: usize) -> Option<Vertex>;

    /// Ids of `dim`-dimensional elements incident to the node nearest to
    /// `point`. Nodes coinciding with that nearest node count as well.
    fn elements_by_coordinates(&self, point: &Vertex, dim: usize) -> Vec<usize>;

    fn element(&self, id: usize) -> Option<&MeshElement>;

    /// Node ids and coordinates of a physical group, sorted by id
    fn nodes_for_physical_group(&self, dim: usize, tag: usize) -> Vec<(usize, Vertex)> {
        let mut ids: BTreeSet<usize> = BTreeSet::new();
        for entity in self.entities_for_physical_group(dim, tag) {
            ids.extend(self.nodes_for_entity(dim, entity));
        }
        ids.into_iter()
            .filter_map(|id| self.node(id).map(|v| (id, v)))
            .collect()
    }

    /// Distinct element kinds present in a physical group
    fn element_kinds_for_physical_group(&self, dim: usize, tag: usize) -> Vec<ElementKind> {
        let mut kinds: BTreeSet<ElementKind> = BTreeSet::new();
        for entity in self.entities_for_physical_group(dim, tag) {
            kinds.extend(self.elements_for_entity(dim, entity).iter().map(|e| e.kind));
        }
        kinds.into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshElement {
    pub id: usize,
    pub kind: ElementKind,
    pub nodes: Vec<usize>,
}

impl MeshElement {
    /// Corner nodes in boundary order; edges join consecutive entries and
    /// the last entry back to the first
    pub fn boundary_cycle(&self) -> &[usize] {
        let corners = self.kind.corner_count().min(self.nodes.len());
        &self.nodes[..corners]
    }
}

enum MeshParseState {
    Format,
    PhysicalNames,
    Entities,
    Nodes,
    Elements,
    Limbo,
}

/// Mesh read back from a gmsh MSH 4.1 ASCII file
#[derive(Debug, Default)]
pub struct GmshMesh {
    physical_names: HashMap<(usize, usize), String>,
    entity_groups: HashMap<(usize, usize), Vec<usize>>,
    nodes: BTreeMap<usize, Vertex>,
    entity_nodes: HashMap<(usize, usize), Vec<usize>>,
    elements: Vec<MeshElement>,
    element_index: HashMap<usize, usize>,
    entity_elements: HashMap<(usize, usize), Vec<usize>>,
    node_elements: HashMap<usize, Vec<usize>>,
}

type Lines<'a> = std::iter::Enumerate<std::str::Lines<'a>>;

fn next_line<'a>(lines: &mut Lines<'a>, section: &str) -> Result<(usize, &'a str), FaultMeshError> {
    match lines.next() {
        Some((i, line)) => Ok((i + 1, line.trim())),
        None => Err(FaultMeshError::Format(format!(
            "Unexpected end of mesh file inside ${section}"
        ))),
    }
}

fn parse_numbers<T: std::str::FromStr>(line: &str, line_no: usize) -> Result<Vec<T>, FaultMeshError> {
    line.split_whitespace()
        .map(|i| {
            i.parse::<T>().map_err(|_| {
                FaultMeshError::Format(format!(
                    "Unexpected value '{i}' in mesh data at line {line_no}"
                ))
            })
        })
        .collect()
}

fn expect_len<T>(values: &[T], len: usize, line_no: usize) -> Result<(), FaultMeshError> {
    if values.len() < len {
        return Err(FaultMeshError::Format(format!(
            "Expected at least {len} values at line {line_no}, found {}",
            values.len()
        )));
    }
    Ok(())
}

impl GmshMesh {
    /// Parses a .msh file into a queryable mesh
    ///
    /// # Arguments
    /// * `mesh_file` - The path to the mesh file
    pub fn load(mesh_file: &str) -> Result<GmshMesh, FaultMeshError> {
        let contents = match std::fs::read_to_string(mesh_file) {
            Ok(c) => c,
            Err(err) => {
                return Err(FaultMeshError::Configuration(format!(
                    "Mesh file {mesh_file} not found ({err}). Run the meshing step first"
                )))
            }
        };

        let mesh = GmshMesh::parse(&contents)?;

        log::info!(
            "loaded {} nodes and {} elements from {}",
            mesh.num_nodes(),
            mesh.num_elements(),
            mesh_file
        );

        Ok(mesh)
    }

    pub fn parse(contents: &str) -> Result<GmshMesh, FaultMeshError> {
        let mut mesh = GmshMesh::default();
        let mut parser_state = MeshParseState::Limbo;
        let mut seen_format = false;
        let mut lines: Lines = contents.lines().enumerate();

        while let Some((i, raw)) = lines.next() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with("$End") {
                parser_state = MeshParseState::Limbo;
                continue;
            }

            match parser_state {
                MeshParseState::Limbo => {
                    parser_state = match line {
                        "$MeshFormat" => MeshParseState::Format,
                        "$PhysicalNames" => MeshParseState::PhysicalNames,
                        "$Entities" => MeshParseState::Entities,
                        "$Nodes" => MeshParseState::Nodes,
                        "$Elements" => MeshParseState::Elements,
                        _ => {
                            if line.starts_with('$') {
                                log::debug!("skipping mesh section {line}");
                            }
                            MeshParseState::Limbo
                        }
                    };
                }
                MeshParseState::Format => {
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() < 2 || !fields[0].starts_with('4') {
                        return Err(FaultMeshError::Format(format!(
                            "Unsupported mesh format '{line}'. Expected MSH 4.1"
                        )));
                    }
                    if fields[1] != "0" {
                        return Err(FaultMeshError::Format(
                            "Binary mesh files are not supported".to_owned(),
                        ));
                    }
                    seen_format = true;
                }
                MeshParseState::PhysicalNames => {
                    let count: Vec<usize> = parse_numbers(line, i + 1)?;
                    expect_len(&count, 1, i + 1)?;
                    for _ in 0..count[0] {
                        let (line_no, entry) = next_line(&mut lines, "PhysicalNames")?;
                        let mut fields = entry.splitn(3, char::is_whitespace);
                        let dim = fields.next().and_then(|f| f.parse::<usize>().ok());
                        let tag = fields.next().and_then(|f| f.parse::<usize>().ok());
                        let name = fields.next().map(|f| f.trim().trim_matches('"').to_owned());
                        match (dim, tag, name) {
                            (Some(dim), Some(tag), Some(name)) => {
                                mesh.physical_names.insert((dim, tag), name);
                            }
                            _ => {
                                return Err(FaultMeshError::Format(format!(
                                    "Malformed physical name at line {line_no}"
                                )))
                            }
                        }
                    }
                }
                MeshParseState::Entities => {
                    let counts: Vec<usize> = parse_numbers(line, i + 1)?;
                    expect_len(&counts, 4, i + 1)?;
                    for (dim, count) in counts.iter().take(4).enumerate() {
                        for _ in 0..*count {
                            let (line_no, entry) = next_line(&mut lines, "Entities")?;
                            let fields: Vec<f64> = parse_numbers(entry, line_no)?;
                            // points carry X Y Z, higher entities a bounding box
                            let physical_at = if dim == 0 { 4 } else { 7 };
                            expect_len(&fields, physical_at + 1, line_no)?;
                            let num_physical = fields[physical_at] as usize;
                            expect_len(&fields, physical_at + 1 + num_physical, line_no)?;
                            let groups: Vec<usize> = fields
                                [physical_at + 1..physical_at + 1 + num_physical]
                                .iter()
                                .map(|t| t.abs() as usize)
                                .collect();
                            mesh.entity_groups.insert((dim, fields[0] as usize), groups);
                        }
                    }
                }
                MeshParseState::Nodes => {
                    let header: Vec<usize> = parse_numbers(line, i + 1)?;
                    expect_len(&header, 2, i + 1)?;
                    for _ in 0..header[0] {
                        let (line_no, block) = next_line(&mut lines, "Nodes")?;
                        let block: Vec<usize> = parse_numbers(block, line_no)?;
                        expect_len(&block, 4, line_no)?;
                        let (entity_dim, entity_tag, num_nodes_local) = (block[0], block[1], block[3]);

                        let mut node_tags: Vec<usize> = Vec::with_capacity(num_nodes_local);
                        for _ in 0..num_nodes_local {
                            let (line_no, tag) = next_line(&mut lines, "Nodes")?;
                            let tag: Vec<usize> = parse_numbers(tag, line_no)?;
                            expect_len(&tag, 1, line_no)?;
                            node_tags.push(tag[0]);
                        }

                        for tag in node_tags.iter() {
                            let (line_no, coords) = next_line(&mut lines, "Nodes")?;
                            let coords: Vec<f64> = parse_numbers(coords, line_no)?;
                            expect_len(&coords, 3, line_no)?;
                            mesh.nodes.insert(*tag, Vertex::new(coords[0], coords[1], coords[2]));
                        }

                        mesh.entity_nodes
                            .entry((entity_dim, entity_tag))
                            .or_default()
                            .extend(node_tags);
                    }
                }
                MeshParseState::Elements => {
                    let header: Vec<usize> = parse_numbers(line, i + 1)?;
                    expect_len(&header, 2, i + 1)?;
                    for _ in 0..header[0] {
                        let (line_no, block) = next_line(&mut lines, "Elements")?;
                        let block: Vec<usize> = parse_numbers(block, line_no)?;
                        expect_len(&block, 4, line_no)?;
                        let (entity_dim, entity_tag, element_type, num_elements) =
                            (block[0], block[1], block[2], block[3]);
                        let kind = ElementKind::from_gmsh(element_type);
                        if kind.is_none() {
                            log::warn!(
                                "skipping {num_elements} elements of unsupported gmsh type {element_type}"
                            );
                        }

                        for _ in 0..num_elements {
                            let (line_no, data) = next_line(&mut lines, "Elements")?;
                            let Some(kind) = kind else { continue };
                            let data: Vec<usize> = parse_numbers(data, line_no)?;
                            expect_len(&data, 1 + kind.node_count(), line_no)?;
                            mesh.push_element(
                                (entity_dim, entity_tag),
                                MeshElement {
                                    id: data[0],
                                    kind,
                                    nodes: data[1..1 + kind.node_count()].to_vec(),
                                },
                            );
                        }
                    }
                }
            }
        }

        if !seen_format {
            return Err(FaultMeshError::Format(
                "Mesh file has no $MeshFormat section".to_owned(),
            ));
        }

        Ok(mesh)
    }

    fn push_element(&mut self, entity: (usize, usize), element: MeshElement) {
        let index = self.elements.len();
        for node in element.nodes.iter() {
            self.node_elements.entry(*node).or_default().push(index);
        }
        self.element_index.insert(element.id, index);
        self.entity_elements.entry(entity).or_default().push(index);
        self.elements.push(element);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }
}

impl MeshQuery for GmshMesh {
    fn physical_group(&self, dim: usize, name: &str) -> Option<PhysicalGroup> {
        self.physical_names
            .iter()
            .find(|((d, _), n)| *d == dim && n.as_str() == name)
            .map(|((dim, tag), name)| PhysicalGroup {
                dim: *dim,
                tag: *tag,
                name: name.clone(),
            })
    }

    fn physical_name(&self, dim: usize, tag: usize) -> Option<&str> {
        self.physical_names.get(&(dim, tag)).map(|n| n.as_str())
    }

    fn entities_for_physical_group(&self, dim: usize, tag: usize) -> Vec<usize> {
        let mut entities: Vec<usize> = self
            .entity_groups
            .iter()
            .filter(|((d, _), groups)| *d == dim && groups.contains(&tag))
            .map(|((_, entity), _)| *entity)
            .collect();
        entities.sort_unstable();
        entities
    }

    fn nodes_for_entity(&self, dim: usize, entity: usize) -> Vec<usize> {
        let mut ids: BTreeSet<usize> = BTreeSet::new();
        if let Some(nodes) = self.entity_nodes.get(&(dim, entity)) {
            ids.extend(nodes.iter().copied());
        }
        if let Some(elements) = self.entity_elements.get(&(dim, entity)) {
            for index in elements {
                ids.extend(self.elements[*index].nodes.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    fn elements_for_entity(&self, dim: usize, entity: usize) -> Vec<&MeshElement> {
        match self.entity_elements.get(&(dim, entity)) {
            Some(indexes) => indexes.iter().map(|i| &self.elements[*i]).collect(),
            None => Vec::new(),
        }
    }

    fn node(&self, id: usize) -> Option<Vertex> {
        self.nodes.get(&id).copied()
    }

    fn elements_by_coordinates(&self, point: &Vertex, dim: usize) -> Vec<usize> {
        let nearest = self
            .nodes
            .values()
            .map(|v| nalgebra::distance(v, point))
            .fold(f64::INFINITY, f64::min);
        if !nearest.is_finite() {
            return Vec::new();
        }

        let tolerance = nearest + 1e-9 * (1.0 + point.coords.norm());
        let mut found: BTreeSet<usize> = BTreeSet::new();
        for (id, vertex) in self.nodes.iter() {
            if nalgebra::distance(vertex, point) > tolerance {
                continue;
            }
            if let Some(elements) = self.node_elements.get(id) {
                found.extend(
                    elements
                        .iter()
                        .map(|i| &self.elements[*i])
                        .filter(|e| e.kind.dimension() == dim)
                        .map(|e| e.id),
                );
            }
        }
        found.into_iter().collect()
    }

    fn element(&self, id: usize) -> Option<&MeshElement> {
        self.element_index.get(&id).map(|i| &self.elements[*i])
    }
}

/// Runs gmsh on a .geo script
///
/// # Arguments
/// * `geo_filepath` - The gmsh script to mesh
/// * `output` - The output filepath of the .msh file
/// * `dim` - The mesh dimension passed to gmsh
pub fn run_gmsh(geo_filepath: &str, output: &str, dim: usize) -> Result<(), FaultMeshError> {
    log::info!("running gmsh on {}...", geo_filepath);
    let output_status = match std::process::Command::new("gmsh")
        .arg(geo_filepath)
        .arg(format!("-{dim}"))
        .arg("-format")
        .arg("msh41")
        .arg("-o")
        .arg(output)
        .output()
    {
        Ok(out) => out,
        Err(err) => {
            return Err(FaultMeshError::Mesher(format!("Gmsh failed: {err}")));
        }
    };

    if !output_status.status.success() {
        return Err(FaultMeshError::Mesher(format!(
            "Gmsh exited with {}: {}",
            output_status.status,
            String::from_utf8_lossy(&output_status.stderr).trim()
        )));
    }

    log::info!("wrote mesh to {}", output);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two quads sharing the cracked edge x = 1. Nodes 2/5 and 3/6 are the
    /// duplicated copies; curve 1 (entity 5) uses 2-3, curve 2 (entity 6)
    /// uses 5-6.
    pub(crate) const TWO_QUADS: &str = r#"$MeshFormat
4.1 0 8
$EndMeshFormat
$PhysicalNames
4
1 10 "Fault"
1 11 "leftBorder"
2 20 "ContinuumDomain"
2 21 "Rock"
$EndPhysicalNames
$Entities
0 3 2 0
4 0 0 0 0 1 0 1 11 2 1 -2
5 1 0 0 1 1 0 1 10 2 3 -4
6 1 0 0 1 1 0 1 10 2 3 -4
1 0 0 0 1 1 0 2 20 21 4 1 2 3 4
2 1 0 0 2 1 0 2 20 21 4 5 6 7 8
$EndEntities
$Nodes
2 8 1 8
2 1 0 4
1
2
3
4
0 0 0
1 0 0
1 1 0
0 1 0
2 2 0 4
5
6
7
8
1 0 0
1 1 0
2 0 0
2 1 0
$EndNodes
$Elements
5 5 1 5
1 4 1 1
1 1 4
1 5 1 1
2 2 3
1 6 1 1
3 5 6
2 1 3 1
4 1 2 3 4
2 2 3 1
5 5 7 8 6
$EndElements
"#;

    #[test]
    fn reads_groups_entities_nodes_and_elements() {
        let mesh = GmshMesh::parse(TWO_QUADS).unwrap();

        assert_eq!(mesh.num_nodes(), 8);
        assert_eq!(mesh.num_elements(), 5);

        let fault = mesh.physical_group(1, "Fault").unwrap();
        assert_eq!(fault.tag, 10);
        assert_eq!(mesh.entities_for_physical_group(1, 10), vec![5, 6]);
        assert_eq!(mesh.entities_for_physical_group(2, 21), vec![1, 2]);
        assert_eq!(mesh.physical_name(2, 21), Some("Rock"));
        assert!(mesh.physical_group(2, "Fault").is_none());

        let quad = mesh.element(5).unwrap();
        assert_eq!(quad.kind, ElementKind::Quad4);
        assert_eq!(quad.boundary_cycle(), &[5, 7, 8, 6]);
        assert_eq!(mesh.node(7), Some(Vertex::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn coincident_nodes_report_elements_of_both_sides() {
        let mesh = GmshMesh::parse(TWO_QUADS).unwrap();
        let at_crack = mesh.elements_by_coordinates(&Vertex::new(1.0, 0.0, 0.0), 2);
        assert_eq!(at_crack, vec![4, 5]);

        let corner = mesh.elements_by_coordinates(&Vertex::new(-0.1, 0.05, 0.0), 2);
        assert_eq!(corner, vec![4]);

        // the bars of both crack curves touch the point
        assert_eq!(mesh.elements_by_coordinates(&Vertex::new(1.0, 0.0, 0.0), 1), vec![2, 3]);
    }

    #[test]
    fn physical_group_nodes_include_boundary_nodes() {
        let mesh = GmshMesh::parse(TWO_QUADS).unwrap();
        let border: Vec<usize> = mesh
            .nodes_for_physical_group(1, 11)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(border, vec![1, 4]);

        let domain = mesh.nodes_for_physical_group(2, 20);
        assert_eq!(domain.len(), 8);
        assert_eq!(mesh.element_kinds_for_physical_group(2, 21), vec![ElementKind::Quad4]);
    }

    #[test]
    fn rejects_legacy_format() {
        let err = GmshMesh::parse("$MeshFormat\n2.2 0 8\n$EndMeshFormat\n").unwrap_err();
        assert!(matches!(err, FaultMeshError::Format(_)));
    }

    #[test]
    fn rejects_truncated_node_block() {
        let contents = "$MeshFormat\n4.1 0 8\n$EndMeshFormat\n$Nodes\n1 2 1 2\n2 1 0 2\n1\n2\n0 0 0\n";
        let err = GmshMesh::parse(contents).unwrap_err();
        assert!(err.to_string().contains("Nodes"));
    }

    #[test]
    fn missing_mesh_file_is_a_configuration_error() {
        let err = GmshMesh::load("/nonexistent/model.msh").unwrap_err();
        assert!(matches!(err, FaultMeshError::Configuration(_)));
    }
}
