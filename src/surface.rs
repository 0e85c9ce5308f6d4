use crate::{
    datatypes::{Triangle, Vertex},
    error::FaultMeshError,
};

const OFF_MARKER: &str = "OFF";

/// One triangulated patch of a horizon or fault
#[derive(Debug, Clone)]
pub struct Surface {
    tag: usize,
    name: String,
    nodes: Vec<Vertex>,
    triangles: Vec<Triangle>,
    global_triangles: Vec<Triangle>,
    kernel_tags: Vec<usize>,
}

impl Surface {
    pub fn new(tag: usize, name: &str) -> Surface {
        Surface {
            tag,
            name: name.to_owned(),
            nodes: Vec::new(),
            triangles: Vec::new(),
            global_triangles: Vec::new(),
            kernel_tags: Vec::new(),
        }
    }

    /// Loads a surface from an OFF file
    ///
    /// # Arguments
    /// * `path` - The path to the .off file
    /// * `tag` - The tag to give the surface
    /// * `name` - A human readable name, used for physical groups
    ///
    /// # Returns
    /// The populated Surface. Any malformed line aborts the whole load.
    pub fn load(path: &str, tag: usize, name: &str) -> Result<Surface, FaultMeshError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                return Err(FaultMeshError::Format(format!(
                    "Unable to open OFF file {path}: {err}"
                )))
            }
        };

        let mut surface = Surface::new(tag, name);
        surface.parse_off(&contents, path)?;

        log::debug!(
            "loaded surface '{}' with {} nodes and {} faces from {}",
            name,
            surface.nodes.len(),
            surface.triangles.len(),
            path
        );

        Ok(surface)
    }

    fn parse_off(&mut self, contents: &str, source: &str) -> Result<(), FaultMeshError> {
        // the marker must be the very first line
        let mut raw_lines = contents.lines().enumerate();
        match raw_lines.next() {
            Some((_, first)) if first.trim() == OFF_MARKER => {}
            _ => {
                return Err(FaultMeshError::Format(format!(
                    "{source} is not a valid OFF file: first line must be '{OFF_MARKER}'"
                )))
            }
        }

        let mut lines = raw_lines
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let (line_no, header) = lines.next().ok_or_else(|| {
            FaultMeshError::Format(format!("{source}: missing OFF header line"))
        })?;
        let counts: Vec<usize> = parse_fields(header, source, line_no)?;
        if counts.len() < 2 {
            return Err(FaultMeshError::Format(format!(
                "{source}:{line_no}: header must declare vertex and face counts"
            )));
        }
        let (num_nodes, num_faces) = (counts[0], counts[1]);

        self.nodes.reserve(num_nodes);
        for _ in 0..num_nodes {
            let (line_no, line) = lines.next().ok_or_else(|| {
                FaultMeshError::Format(format!(
                    "{source}: expected {num_nodes} vertices, found {}",
                    self.nodes.len()
                ))
            })?;
            let coords: Vec<f64> = parse_fields(line, source, line_no)?;
            if coords.len() < 3 {
                return Err(FaultMeshError::Format(format!(
                    "{source}:{line_no}: vertex needs three coordinates"
                )));
            }
            self.nodes.push(Vertex::new(coords[0], coords[1], coords[2]));
        }

        self.triangles.reserve(num_faces);
        for _ in 0..num_faces {
            let (line_no, line) = lines.next().ok_or_else(|| {
                FaultMeshError::Format(format!(
                    "{source}: expected {num_faces} faces, found {}",
                    self.triangles.len()
                ))
            })?;
            let face: Vec<usize> = parse_fields(line, source, line_no)?;
            if face.len() < 2 {
                return Err(FaultMeshError::Format(format!(
                    "{source}:{line_no}: empty face record"
                )));
            }
            // drop the leading vertex count
            self.triangles.push(face[1..].to_vec());
        }

        Ok(())
    }

    pub fn tag(&self) -> usize {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, index: usize) -> &Vertex {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Vertex] {
        &self.nodes
    }

    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn add_node(&mut self, vertex: Vertex) {
        self.nodes.push(vertex);
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Triangles in the geometry's global node numbering. Empty until the
    /// surface is added to a Geometry.
    pub fn global_triangles(&self) -> &[Triangle] {
        &self.global_triangles
    }

    pub(crate) fn set_tag(&mut self, tag: usize) {
        self.tag = tag;
    }

    pub(crate) fn push_global_triangle(&mut self, triangle: Triangle) {
        self.global_triangles.push(triangle);
    }

    pub fn kernel_tags(&self) -> &[usize] {
        &self.kernel_tags
    }

    pub(crate) fn push_kernel_tag(&mut self, tag: usize) {
        self.kernel_tags.push(tag);
    }

    pub(crate) fn clear_kernel_tags(&mut self) {
        self.kernel_tags.clear();
    }

    /// Plane surface entities created for this patch as `(dim, tag)` pairs
    pub fn kernel_dim_tags(&self) -> Vec<(usize, usize)> {
        self.kernel_tags.iter().map(|t| (2, *t)).collect()
    }
}

fn parse_fields<T: std::str::FromStr>(
    line: &str,
    source: &str,
    line_no: usize,
) -> Result<Vec<T>, FaultMeshError> {
    line.split_whitespace()
        .map(|field| {
            field.parse::<T>().map_err(|_| {
                FaultMeshError::Format(format!(
                    "{source}:{line_no}: unexpected value '{field}'"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_off(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn loads_square_patch() {
        let file = write_off(
            "OFF\n4 2 5\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n3 0 1 2\n3 0 2 3\n",
        );
        let surface = Surface::load(file.path().to_str().unwrap(), 3, "horizon").unwrap();

        assert_eq!(surface.tag(), 3);
        assert_eq!(surface.name(), "horizon");
        assert_eq!(surface.num_nodes(), 4);
        assert_eq!(surface.node(2), &Vertex::new(1.0, 1.0, 0.0));
        assert_eq!(surface.triangles(), &[vec![0, 1, 2], vec![0, 2, 3]]);
        assert!(surface.global_triangles().is_empty());
    }

    #[test]
    fn edge_count_is_optional_and_comments_are_skipped() {
        let file = write_off("OFF\n# patch exported from a horizon\n3 1\n0 0 1\n1 0 1\n\n0 1 1\n3 0 1 2\n");
        let surface = Surface::load(file.path().to_str().unwrap(), 0, "p").unwrap();
        assert_eq!(surface.num_nodes(), 3);
        assert_eq!(surface.num_triangles(), 1);
    }

    #[test]
    fn rejects_missing_marker() {
        let file = write_off("COFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n");
        let err = Surface::load(file.path().to_str().unwrap(), 0, "p").unwrap_err();
        assert!(matches!(err, FaultMeshError::Format(_)));
    }

    #[test]
    fn rejects_truncated_face_list() {
        let file = write_off("OFF\n3 2 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n");
        let err = Surface::load(file.path().to_str().unwrap(), 0, "p").unwrap_err();
        assert!(err.to_string().contains("expected 2 faces"));
    }

    #[test]
    fn rejects_non_numeric_vertex() {
        let file = write_off("OFF\n1 0 0\n0.0 zero 1.0\n");
        let err = Surface::load(file.path().to_str().unwrap(), 0, "p").unwrap_err();
        assert!(err.to_string().contains(":3:"));
    }

    #[test]
    fn missing_file_is_a_format_error() {
        let err = Surface::load("/nonexistent/patch.off", 0, "p").unwrap_err();
        assert!(matches!(err, FaultMeshError::Format(_)));
    }
}
