use std::collections::BTreeSet;

use indicatif::ProgressBar;

use crate::{
    datatypes::{ElementKind, ElementShape, InterfaceElement, InterfaceOrdering, PhysicalGroup},
    error::FaultMeshError,
    mesher::{MeshElement, MeshQuery},
};

/// Dimension of the continuum elements on either side of a discontinuity
const CONTINUUM_DIM: usize = 2;

/// A cracked curve as two node-pair streams, one per side
///
/// After node duplication the mesh carries the same geometric curve twice:
/// curve 1 references the original nodes, curve 2 the duplicates. Entry `i`
/// of both streams describes the same geometric segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscontinuityCurve {
    name: String,
    segment_ids: Vec<usize>,
    curve1: Vec<[usize; 2]>,
    curve2: Vec<[usize; 2]>,
}

impl DiscontinuityCurve {
    pub fn new(
        name: &str,
        segment_ids: Vec<usize>,
        curve1: Vec<[usize; 2]>,
        curve2: Vec<[usize; 2]>,
    ) -> Result<DiscontinuityCurve, FaultMeshError> {
        if curve1.len() != curve2.len() || segment_ids.len() != curve1.len() {
            return Err(FaultMeshError::Configuration(format!(
                "Discontinuity '{name}' has {} segments on curve 1 and {} on curve 2",
                curve1.len(),
                curve2.len()
            )));
        }

        Ok(DiscontinuityCurve {
            name: name.to_owned(),
            segment_ids,
            curve1,
            curve2,
        })
    }

    /// Reads both sides of a cracked curve from its physical group
    ///
    /// The line elements of every curve entity except the last one form
    /// curve 1; the last entity, created by the node duplication, is curve 2.
    ///
    /// # Arguments
    /// * `mesh` - The mesh after node duplication
    /// * `group` - The 1D physical group the discontinuity was defined with
    pub fn from_physical_group<M: MeshQuery>(
        mesh: &M,
        group: &PhysicalGroup,
    ) -> Result<DiscontinuityCurve, FaultMeshError> {
        let entities = mesh.entities_for_physical_group(group.dim, group.tag);
        if entities.len() < 2 {
            return Err(FaultMeshError::Configuration(format!(
                "Discontinuity '{}' has {} curve entities, expected at least two. \
                Were the nodes along it duplicated?",
                group.name,
                entities.len()
            )));
        }

        let mut segment_ids: Vec<usize> = Vec::new();
        let mut curve1: Vec<[usize; 2]> = Vec::new();
        let last = entities[entities.len() - 1];
        let others = &entities[..entities.len() - 1];

        for entity in others {
            for segment in line_elements(mesh, group, *entity)? {
                segment_ids.push(segment.id);
                curve1.push([segment.nodes[0], segment.nodes[1]]);
            }
        }

        let curve2: Vec<[usize; 2]> = line_elements(mesh, group, last)?
            .iter()
            .map(|segment| [segment.nodes[0], segment.nodes[1]])
            .collect();

        if curve1.is_empty() {
            return Err(FaultMeshError::Configuration(format!(
                "Discontinuity '{}' has no line elements on curve 1",
                group.name
            )));
        }

        DiscontinuityCurve::new(&group.name, segment_ids, curve1, curve2)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_segments(&self) -> usize {
        self.curve1.len()
    }

    pub fn segment_ids(&self) -> &[usize] {
        &self.segment_ids
    }

    pub fn curve1(&self) -> &[[usize; 2]] {
        &self.curve1
    }

    pub fn curve2(&self) -> &[[usize; 2]] {
        &self.curve2
    }
}

/// Two-node line elements of one curve entity. Any other element kind on
/// the curve is rejected instead of being skipped.
fn line_elements<'a, M: MeshQuery>(
    mesh: &'a M,
    group: &PhysicalGroup,
    entity: usize,
) -> Result<Vec<&'a MeshElement>, FaultMeshError> {
    let elements = mesh.elements_for_entity(group.dim, entity);
    if let Some(other) = elements.iter().find(|e| e.kind != ElementKind::Bar2) {
        return Err(FaultMeshError::Configuration(format!(
            "Discontinuity '{}' contains {} element {} on curve {}, only bar2 lines can be split",
            group.name,
            other.kind.gema_name(),
            other.id,
            entity
        )));
    }
    Ok(elements)
}

/// Builds one double-node interface element per discontinuity segment
///
/// # Arguments
/// * `mesh` - The mesh after node duplication
/// * `curve` - Both sides of the discontinuity
/// * `shape` - Nominal shape of the continuum elements, sets how many edges are searched
/// * `ordering` - Node order convention applied to every element of the run
///
/// # Returns
/// The interface elements in segment order. The first segment that is not
/// shared by exactly two continuum elements aborts the construction.
pub fn create_interface_elements<M: MeshQuery>(
    mesh: &M,
    curve: &DiscontinuityCurve,
    shape: ElementShape,
    ordering: InterfaceOrdering,
) -> Result<Vec<InterfaceElement>, FaultMeshError> {
    log::info!(
        "building interface elements along '{}' ({} segments)",
        curve.name(),
        curve.num_segments()
    );

    let mut interface_elements: Vec<InterfaceElement> = Vec::with_capacity(curve.num_segments());

    let bar = ProgressBar::new(curve.num_segments() as u64);
    for (el, (side1, side2)) in curve.curve1().iter().zip(curve.curve2()).enumerate() {
        let segment_id = curve.segment_ids()[el];
        let adjacent = adjacent_elements(mesh, el, segment_id, side1)?;

        let mut matched: Vec<(Side, [usize; 2])> = Vec::with_capacity(2);
        for element_id in adjacent {
            let element = match mesh.element(element_id) {
                Some(e) => e,
                None => {
                    return Err(FaultMeshError::Topology {
                        segment: el,
                        message: format!("element {element_id} is not part of the mesh"),
                    })
                }
            };

            match find_interface_edge(element.boundary_cycle(), shape, side1, side2) {
                Some(found) => matched.push(found),
                None => {
                    return Err(FaultMeshError::Topology {
                        segment: el,
                        message: format!(
                            "no edge of element {} matches line {} nodes {:?} or {:?}",
                            element_id, segment_id, side1, side2
                        ),
                    })
                }
            }
        }

        let (first, second) = match (matched[0], matched[1]) {
            ((Side::One, a), (Side::Two, b)) | ((Side::Two, b), (Side::One, a)) => (a, b),
            _ => {
                return Err(FaultMeshError::Topology {
                    segment: el,
                    message: format!(
                        "elements {} and {} both touch the same side of line {}",
                        adjacent[0], adjacent[1], segment_id
                    ),
                })
            }
        };

        let mut nodes = [first[0], first[1], second[0], second[1]];
        if ordering == InterfaceOrdering::Reversed {
            nodes.reverse();
        }
        interface_elements.push(InterfaceElement { nodes });
        bar.inc(1);
    }
    bar.finish();

    log::info!(
        "created {} interface elements for '{}'",
        interface_elements.len(),
        curve.name()
    );

    Ok(interface_elements)
}

/// The two continuum elements sharing both endpoints of a curve 1 segment
fn adjacent_elements<M: MeshQuery>(
    mesh: &M,
    el: usize,
    segment_id: usize,
    segment: &[usize; 2],
) -> Result<[usize; 2], FaultMeshError> {
    let mut incident: Vec<BTreeSet<usize>> = Vec::with_capacity(2);
    for node_id in segment {
        let point = match mesh.node(*node_id) {
            Some(p) => p,
            None => {
                return Err(FaultMeshError::Topology {
                    segment: el,
                    message: format!("node {node_id} is not part of the mesh"),
                })
            }
        };
        incident.push(
            mesh.elements_by_coordinates(&point, CONTINUUM_DIM)
                .into_iter()
                .collect(),
        );
    }

    let shared: Vec<usize> = incident[0].intersection(&incident[1]).copied().collect();
    if shared.len() != 2 {
        return Err(FaultMeshError::Topology {
            segment: el,
            message: format!(
                "expected 2 elements adjacent to line {} nodes {:?}, found {} {:?}",
                segment_id,
                segment,
                shared.len(),
                shared
            ),
        });
    }

    Ok([shared[0], shared[1]])
}

/// Side of the discontinuity an interface edge lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    One,
    Two,
}

/// First edge of the boundary cycle whose endpoints are both on one side of
/// the segment, with the side it matched
fn find_interface_edge(
    cycle: &[usize],
    shape: ElementShape,
    side1: &[usize; 2],
    side2: &[usize; 2],
) -> Option<(Side, [usize; 2])> {
    if cycle.is_empty() {
        return None;
    }

    let on_side = |edge: &[usize; 2], side: &[usize; 2]| edge.contains(&side[0]) && edge.contains(&side[1]);
    (0..shape.edge_count())
        .map(|border| [cycle[border % cycle.len()], cycle[(border + 1) % cycle.len()]])
        .find_map(|edge| {
            if on_side(&edge, side1) {
                Some((Side::One, edge))
            } else if on_side(&edge, side2) {
                Some((Side::Two, edge))
            } else {
                None
            }
        })
}
