use nalgebra::{Point3, Vector3};

use crate::error::FaultMeshError;

pub type Vertex = Point3<f64>;

/// Node ids of one triangle in some index space (local or global)
pub type Triangle = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Vertex,
    pub max: Vertex,
}

impl BoundingBox {
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// Element kinds understood by the mesh adapter, keyed by gmsh type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Bar2,
    Bar3,
    Tri3,
    Quad4,
    Tet4,
    Hex8,
    Tri6,
    Quad9,
    Point,
    Quad8,
    Hex20,
}

impl ElementKind {
    pub fn from_gmsh(code: usize) -> Option<ElementKind> {
        match code {
            1 => Some(ElementKind::Bar2),
            8 => Some(ElementKind::Bar3),
            2 => Some(ElementKind::Tri3),
            3 => Some(ElementKind::Quad4),
            4 => Some(ElementKind::Tet4),
            5 => Some(ElementKind::Hex8),
            9 => Some(ElementKind::Tri6),
            10 => Some(ElementKind::Quad9),
            15 => Some(ElementKind::Point),
            16 => Some(ElementKind::Quad8),
            17 => Some(ElementKind::Hex20),
            _ => None,
        }
    }

    pub fn gmsh_code(&self) -> usize {
        match self {
            ElementKind::Bar2 => 1,
            ElementKind::Bar3 => 8,
            ElementKind::Tri3 => 2,
            ElementKind::Quad4 => 3,
            ElementKind::Tet4 => 4,
            ElementKind::Hex8 => 5,
            ElementKind::Tri6 => 9,
            ElementKind::Quad9 => 10,
            ElementKind::Point => 15,
            ElementKind::Quad8 => 16,
            ElementKind::Hex20 => 17,
        }
    }

    /// Element type name used in the solver's mesh tables
    pub fn gema_name(&self) -> &'static str {
        match self {
            ElementKind::Bar2 => "bar2",
            ElementKind::Bar3 => "bar3",
            ElementKind::Tri3 => "tri3",
            ElementKind::Quad4 => "quad4",
            ElementKind::Tet4 => "tet4",
            ElementKind::Hex8 => "hex8",
            ElementKind::Tri6 => "tri6",
            ElementKind::Quad9 => "quad9",
            ElementKind::Point => "point1",
            ElementKind::Quad8 => "quad8",
            ElementKind::Hex20 => "hex20",
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            ElementKind::Point => 1,
            ElementKind::Bar2 => 2,
            ElementKind::Bar3 => 3,
            ElementKind::Tri3 => 3,
            ElementKind::Quad4 => 4,
            ElementKind::Tet4 => 4,
            ElementKind::Tri6 => 6,
            ElementKind::Hex8 => 8,
            ElementKind::Quad8 => 8,
            ElementKind::Quad9 => 9,
            ElementKind::Hex20 => 20,
        }
    }

    /// Number of corner nodes. Gmsh lists corners first, so the leading
    /// `corner_count` nodes of a connectivity form the boundary cycle of
    /// a planar element.
    pub fn corner_count(&self) -> usize {
        match self {
            ElementKind::Tri3 | ElementKind::Tri6 => 3,
            ElementKind::Quad4 | ElementKind::Quad8 | ElementKind::Quad9 => 4,
            ElementKind::Tet4 => 4,
            ElementKind::Hex8 | ElementKind::Hex20 => 8,
            ElementKind::Bar2 | ElementKind::Bar3 => 2,
            ElementKind::Point => 1,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            ElementKind::Point => 0,
            ElementKind::Bar2 | ElementKind::Bar3 => 1,
            ElementKind::Tri3
            | ElementKind::Quad4
            | ElementKind::Tri6
            | ElementKind::Quad9
            | ElementKind::Quad8 => 2,
            ElementKind::Tet4 | ElementKind::Hex8 | ElementKind::Hex20 => 3,
        }
    }

    /// Default integration rule order for the solver
    pub fn integration_order(&self) -> usize {
        match self {
            ElementKind::Point => 1,
            ElementKind::Bar2 => 2,
            ElementKind::Bar3 => 3,
            ElementKind::Tri3 => 3,
            ElementKind::Quad4 => 2,
            ElementKind::Tet4 => 4,
            ElementKind::Hex8 => 2,
            ElementKind::Tri6 => 6,
            ElementKind::Quad9 | ElementKind::Quad8 | ElementKind::Hex20 => 3,
        }
    }
}

/// Nominal shape of the continuum elements next to a discontinuity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Triangle,
    Quadrilateral,
}

impl ElementShape {
    pub fn parse(name: &str) -> Result<ElementShape, FaultMeshError> {
        match name.trim() {
            "tri3" | "triangle" => Ok(ElementShape::Triangle),
            "quad4" | "quadrilateral" => Ok(ElementShape::Quadrilateral),
            other => Err(FaultMeshError::Configuration(format!(
                "Unsupported element shape '{other}'. Expected tri3 or quad4"
            ))),
        }
    }

    pub fn edge_count(&self) -> usize {
        match self {
            ElementShape::Triangle => 3,
            ElementShape::Quadrilateral => 4,
        }
    }
}

/// Node order convention of the interface elements of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceOrdering {
    Natural,
    Reversed,
}

impl InterfaceOrdering {
    pub fn parse(name: &str) -> Result<InterfaceOrdering, FaultMeshError> {
        match name.trim() {
            "natural" => Ok(InterfaceOrdering::Natural),
            "reversed" => Ok(InterfaceOrdering::Reversed),
            other => Err(FaultMeshError::Configuration(format!(
                "Unknown interface ordering '{other}'. Expected natural or reversed"
            ))),
        }
    }
}

/// Zero-thickness double-node element: the matched edge on side 1 of the
/// discontinuity followed by the matched edge on side 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceElement {
    pub nodes: [usize; 4],
}

/// Physical group handle as reported by the mesh collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalGroup {
    pub dim: usize,
    pub tag: usize,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmsh_codes_map_back_and_forth() {
        for code in [1, 2, 3, 4, 5, 8, 9, 10, 15, 16, 17] {
            let kind = ElementKind::from_gmsh(code).unwrap();
            assert_eq!(kind.gmsh_code(), code);
        }
        assert!(ElementKind::from_gmsh(7).is_none());
    }

    #[test]
    fn quad_shape_walks_four_edges() {
        assert_eq!(ElementShape::parse("quad4").unwrap().edge_count(), 4);
        assert_eq!(ElementShape::parse("tri3").unwrap().edge_count(), 3);
        assert!(ElementShape::parse("hex8").is_err());
    }

    #[test]
    fn ordering_requires_known_name() {
        assert_eq!(
            InterfaceOrdering::parse("reversed").unwrap(),
            InterfaceOrdering::Reversed
        );
        assert!(InterfaceOrdering::parse("backwards").is_err());
    }
}
