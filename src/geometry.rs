use std::collections::HashMap;
use std::io::{BufWriter, Write};

use indicatif::ProgressBar;

use crate::{
    datatypes::{BoundingBox, Triangle, Vertex},
    error::FaultMeshError,
    surface::Surface,
};

/// Triangle in global node numbering with a back-link to its surface
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalTriangle {
    pub nodes: Triangle,
    pub surface: usize,
}

/// Settings for the gmsh script written by `Geometry::write_geo`
#[derive(Debug, Clone)]
pub struct GeoOptions {
    pub bounding_box: bool,
    pub characteristic_length_min: f64,
    pub characteristic_length_max: f64,
}

/// All loaded surfaces merged into one append-only node/triangle numbering
#[derive(Debug, Default)]
pub struct Geometry {
    surfaces: Vec<Surface>,
    triangles: Vec<GlobalTriangle>,
    nodes: Vec<Vertex>,
}

impl Geometry {
    pub fn new() -> Geometry {
        Geometry::default()
    }

    /// Appends a surface, shifting its triangles by the current node count
    ///
    /// # Arguments
    /// * `surface` - The surface to take ownership of
    ///
    /// # Returns
    /// The tag assigned to the surface (its insertion index)
    pub fn add_surface(&mut self, mut surface: Surface) -> usize {
        let tag = self.surfaces.len();
        let offset = self.nodes.len();

        surface.set_tag(tag);
        for i in 0..surface.num_triangles() {
            let triangle: Triangle = surface.triangle(i).iter().map(|n| n + offset).collect();
            self.triangles.push(GlobalTriangle {
                nodes: triangle.clone(),
                surface: tag,
            });
            surface.push_global_triangle(triangle);
        }

        self.nodes.extend_from_slice(surface.nodes());
        self.surfaces.push(surface);

        tag
    }

    /// Loads an OFF patch and adds it to the geometry
    pub fn load_surface(&mut self, path: &str, name: &str) -> Result<usize, FaultMeshError> {
        let surface = Surface::load(path, self.surfaces.len(), name)?;
        let tag = self.add_surface(surface);
        log::info!(
            "added surface '{}' as tag {} ({} nodes total)",
            name,
            tag,
            self.nodes.len()
        );
        Ok(tag)
    }

    pub fn surface(&self, tag: usize) -> Option<&Surface> {
        self.surfaces.get(tag)
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn node(&self, index: usize) -> &Vertex {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Vertex] {
        &self.nodes
    }

    pub fn triangle(&self, index: usize) -> &GlobalTriangle {
        &self.triangles[index]
    }

    pub fn triangles(&self) -> &[GlobalTriangle] {
        &self.triangles
    }

    pub fn num_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Node coordinates flattened as `[x0, y0, z0, x1, ...]`
    pub fn coordinates_vector(&self) -> Vec<f64> {
        self.nodes.iter().flat_map(|n| [n.x, n.y, n.z]).collect()
    }

    /// Global triangle connectivity flattened in insertion order
    pub fn triangles_vector(&self) -> Vec<usize> {
        self.triangles
            .iter()
            .flat_map(|t| t.nodes.iter().copied())
            .collect()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        bounding_box_of(&self.nodes)
    }

    pub fn centroid(&self) -> Option<Vertex> {
        centroid_of(&self.nodes)
    }

    pub fn surface_centroid(&self, tag: usize) -> Option<Vertex> {
        self.surfaces.get(tag).and_then(|s| centroid_of(s.nodes()))
    }

    /// Vertical extent of the model, `|max z - min z|`
    pub fn depth_range(&self) -> Option<f64> {
        self.bounding_box().map(|b| (b.max.z - b.min.z).abs())
    }

    /// Writes a gmsh script rebuilding the geometry as plane surfaces
    ///
    /// Each triangle becomes a curve loop and a plane surface; edges shared
    /// between triangles, including across patches, become a single line.
    /// The plane surface tags are recorded on the owning surfaces.
    ///
    /// # Arguments
    /// * `output_file` - The output .geo file
    /// * `options` - Bounding box and mesh size settings
    pub fn write_geo(&mut self, output_file: &str, options: &GeoOptions) -> Result<(), FaultMeshError> {
        let file = match std::fs::File::create(output_file) {
            Ok(f) => f,
            Err(err) => {
                return Err(FaultMeshError::Writer(format!(
                    "Failed to create {output_file}: {err}"
                )))
            }
        };
        let mut geo_file = BufWriter::new(file);

        writeln!(geo_file, "SetFactory(\"OpenCASCADE\");")?;

        writeln!(geo_file, "\n// Define points")?;
        for (i, vertex) in self.nodes.iter().enumerate() {
            writeln!(
                geo_file,
                "Point({}) = {{ {}, {}, {}, 1.0 }};",
                i + 1,
                vertex.x,
                vertex.y,
                vertex.z
            )?;
        }

        // key: sorted node pair, value: (line tag, start node of the line)
        let mut lines: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        let mut surface_counter: usize = 0;

        let bar = ProgressBar::new(self.triangles.len() as u64);
        for surface in self.surfaces.iter_mut() {
            writeln!(geo_file, "\n// Triangles of surface {}", surface.name())?;

            let mut plane_tags: Vec<usize> = Vec::with_capacity(surface.num_triangles());
            for triangle in surface.global_triangles() {
                let mut loop_members: Vec<String> = Vec::with_capacity(triangle.len());

                for i in 0..triangle.len() {
                    let start = triangle[i];
                    let end = triangle[(i + 1) % triangle.len()];
                    let key = (start.min(end), start.max(end));

                    let (line_tag, line_start) = match lines.get(&key) {
                        Some(line) => *line,
                        None => {
                            let line_tag = lines.len() + 1;
                            writeln!(geo_file, "Line({}) = {{ {}, {} }};", line_tag, start + 1, end + 1)?;
                            lines.insert(key, (line_tag, start));
                            (line_tag, start)
                        }
                    };

                    if line_start == start {
                        loop_members.push(format!("{line_tag}"));
                    } else {
                        loop_members.push(format!("-{line_tag}"));
                    }
                }

                surface_counter += 1;
                writeln!(
                    geo_file,
                    "Curve Loop({}) = {{ {} }};",
                    surface_counter,
                    loop_members.join(", ")
                )?;
                writeln!(
                    geo_file,
                    "Plane Surface({}) = {{ {} }};",
                    surface_counter, surface_counter
                )?;
                plane_tags.push(surface_counter);
                bar.inc(1);
            }

            surface.clear_kernel_tags();
            for tag in plane_tags {
                surface.push_kernel_tag(tag);
            }
        }
        bar.finish();

        writeln!(geo_file, "\n// Physical groups")?;
        for surface in self.surfaces.iter() {
            log::debug!(
                "surface '{}' maps to plane surfaces {:?}",
                surface.name(),
                surface.kernel_dim_tags()
            );
            let tags: Vec<String> = surface.kernel_tags().iter().map(|t| t.to_string()).collect();
            writeln!(
                geo_file,
                "Physical Surface(\"{}\") = {{ {} }};",
                surface.name(),
                tags.join(", ")
            )?;
        }

        if options.bounding_box {
            if let Some(bbox) = self.bounding_box() {
                let size = bbox.size();
                writeln!(geo_file, "\n// Bounding volume")?;
                writeln!(
                    geo_file,
                    "Box(1) = {{ {}, {}, {}, {}, {}, {} }};",
                    bbox.min.x, bbox.min.y, bbox.min.z, size.x, size.y, size.z
                )?;
            }
        }

        write!(
            geo_file,
            "\n// Define Mesh Settings\n\
            Mesh.ElementOrder = 1;\n\
            Mesh.CharacteristicLengthMin = {cl_min};\n\
            Mesh.CharacteristicLengthMax = {cl_max};\n",
            cl_min = options.characteristic_length_min,
            cl_max = options.characteristic_length_max,
        )?;
        geo_file.flush()?;

        log::info!(
            "wrote {} points, {} lines and {} plane surfaces to {}",
            self.nodes.len(),
            lines.len(),
            surface_counter,
            output_file
        );

        Ok(())
    }
}

fn bounding_box_of(nodes: &[Vertex]) -> Option<BoundingBox> {
    let first = nodes.first()?;
    let mut min = *first;
    let mut max = *first;
    for node in nodes.iter().skip(1) {
        min = min.inf(node);
        max = max.sup(node);
    }
    Some(BoundingBox { min, max })
}

fn centroid_of(nodes: &[Vertex]) -> Option<Vertex> {
    if nodes.is_empty() {
        return None;
    }
    let sum = nodes
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, n| acc + n.coords);
    Some(Vertex::from(sum / nodes.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Surface {
        let mut surface = Surface::new(0, "A");
        surface.add_node(Vertex::new(0.0, 0.0, 0.0));
        surface.add_node(Vertex::new(1.0, 0.0, 0.0));
        surface.add_node(Vertex::new(1.0, 1.0, 0.0));
        surface.add_node(Vertex::new(0.0, 1.0, 0.0));
        surface.add_triangle(vec![0, 1, 2]);
        surface.add_triangle(vec![0, 2, 3]);
        surface
    }

    fn single_triangle(name: &str, z: f64) -> Surface {
        let mut surface = Surface::new(0, name);
        surface.add_node(Vertex::new(0.0, 0.0, z));
        surface.add_node(Vertex::new(2.0, 0.0, z));
        surface.add_node(Vertex::new(0.0, 2.0, z));
        surface.add_triangle(vec![0, 1, 2]);
        surface
    }

    #[test]
    fn second_surface_is_offset_by_first_node_count() {
        let mut geometry = Geometry::new();
        let a = geometry.add_surface(square());
        let b = geometry.add_surface(single_triangle("B", -1.0));

        assert_eq!((a, b), (0, 1));
        assert_eq!(geometry.num_nodes(), 7);
        assert_eq!(geometry.triangle(2).nodes, vec![4, 5, 6]);
        assert_eq!(geometry.triangle(2).surface, 1);
        assert_eq!(geometry.surface(1).unwrap().global_triangles(), &[vec![4, 5, 6]]);
        assert_eq!(geometry.surface(1).unwrap().tag(), 1);
    }

    #[test]
    fn earlier_ids_survive_later_insertions() {
        let mut geometry = Geometry::new();
        geometry.add_surface(square());
        let before: Vec<GlobalTriangle> = geometry.triangles().to_vec();

        geometry.add_surface(single_triangle("B", 0.0));
        geometry.add_surface(single_triangle("C", 5.0));

        assert_eq!(&geometry.triangles()[..before.len()], &before[..]);
        assert_eq!(geometry.surface(0).unwrap().global_triangles(), &[vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn global_indices_stay_in_range_and_increase_per_surface() {
        let mut geometry = Geometry::new();
        let sizes = [4, 3, 3];
        geometry.add_surface(square());
        geometry.add_surface(single_triangle("B", 1.0));
        geometry.add_surface(single_triangle("C", 2.0));

        let total: usize = sizes.iter().sum();
        assert_eq!(geometry.num_nodes(), total);
        assert!(geometry.triangles_vector().iter().all(|n| *n < total));

        for i in 0..geometry.num_surfaces() {
            for j in i + 1..geometry.num_surfaces() {
                let max_i = geometry.surface(i).unwrap().global_triangles().iter().flatten().max().unwrap();
                let min_j = geometry.surface(j).unwrap().global_triangles().iter().flatten().min().unwrap();
                assert!(min_j > max_i);
            }
        }
    }

    #[test]
    fn derived_queries_follow_the_current_nodes() {
        let mut geometry = Geometry::new();
        assert!(geometry.bounding_box().is_none());
        assert!(geometry.depth_range().is_none());

        geometry.add_surface(square());
        assert_eq!(geometry.depth_range(), Some(0.0));
        assert_eq!(geometry.centroid(), Some(Vertex::new(0.5, 0.5, 0.0)));

        geometry.add_surface(single_triangle("B", -3.0));
        assert_eq!(geometry.depth_range(), Some(3.0));
        let bbox = geometry.bounding_box().unwrap();
        assert_eq!(bbox.min, Vertex::new(0.0, 0.0, -3.0));
        assert_eq!(bbox.max, Vertex::new(2.0, 2.0, 0.0));
        assert_eq!(geometry.surface_centroid(0), Some(Vertex::new(0.5, 0.5, 0.0)));
        assert!(geometry.surface_centroid(9).is_none());
    }

    #[test]
    fn flattened_vectors_follow_insertion_order() {
        let mut geometry = Geometry::new();
        geometry.add_surface(single_triangle("B", 1.0));
        assert_eq!(
            geometry.coordinates_vector(),
            vec![0.0, 0.0, 1.0, 2.0, 0.0, 1.0, 0.0, 2.0, 1.0]
        );
        assert_eq!(geometry.triangles_vector(), vec![0, 1, 2]);
    }

    #[test]
    fn geo_script_shares_lines_between_triangles() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.geo");
        let output = output.to_str().unwrap();

        let mut geometry = Geometry::new();
        geometry.add_surface(square());
        geometry.add_surface(single_triangle("B", -1.0));
        let options = GeoOptions {
            bounding_box: true,
            characteristic_length_min: 0.1,
            characteristic_length_max: 0.5,
        };
        geometry.write_geo(output, &options).unwrap();

        let script = std::fs::read_to_string(output).unwrap();
        assert_eq!(script.matches("Point(").count(), 7);
        // square: 5 unique edges, triangle: 3
        assert_eq!(script.matches("\nLine(").count(), 8);
        assert!(script.contains("Curve Loop(2) = { -3, 4, 5 };"));
        assert!(script.contains("Physical Surface(\"A\") = { 1, 2 };"));
        assert!(script.contains("Physical Surface(\"B\") = { 3 };"));
        assert!(script.contains("Box(1) = { 0, 0, -1, 2, 2, 1 };"));
        assert!(script.contains("Mesh.CharacteristicLengthMax = 0.5;"));

        assert_eq!(geometry.surface(0).unwrap().kernel_dim_tags(), vec![(2, 1), (2, 2)]);
        assert_eq!(geometry.surface(1).unwrap().kernel_tags(), &[3]);

        // a second export does not accumulate tags
        geometry.write_geo(output, &options).unwrap();
        assert_eq!(geometry.surface(1).unwrap().kernel_tags(), &[3]);
    }
}
