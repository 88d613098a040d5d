//! Voronoi-box facet geometry for the two-point flux approximation.
//!
//! For every interior facet shared by cells `a` and `b` the precomputation
//! stores the inter-centroid distance and the control-volume facet area
//! projected onto the centre connection:
//!
//! ```text
//! c       = centroid(a) - centroid(b)
//! d       = |c|
//! ratio   = (c . n_b) / d          n_b: unit normal pointing out of b
//! A_eff   = |facet| * ratio
//! ```
//!
//! On an admissible Voronoi mesh the ratio is one. Boundary facets and
//! non-manifold facets have no entry.

use log::{debug, warn};

use super::mesh::MeshTopology;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FacetGeometry {
    pub effective_area: f64,
    pub distance: f64,
}

#[derive(Clone, Debug, Default)]
pub struct BoxGeometry {
    facets: Vec<Option<FacetGeometry>>,
}

impl BoxGeometry {
    pub fn compute<M: MeshTopology + ?Sized>(mesh: &M) -> Self {
        let mut facets = vec![None; mesh.num_facets()];
        let mut skipped = 0usize;

        for (facet, slot) in facets.iter_mut().enumerate() {
            let (a, b) = match mesh.cells_of_facet(facet) {
                [a, b] => (*a, *b),
                [_] | [] => continue,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let center_connection = mesh.cell_centroid(a) - mesh.cell_centroid(b);
            let distance = center_connection.length();
            if distance <= f64::EPSILON {
                warn!("Facet {facet} joins coincident centroids of cells {a} and {b}; skipped");
                continue;
            }

            let outer_normal = mesh.outward_normal(facet, b);
            let effective_ratio = center_connection.dot(outer_normal) / distance;
            *slot = Some(FacetGeometry {
                effective_area: mesh.facet_measure(facet) * effective_ratio,
                distance,
            });
        }

        if skipped > 0 {
            debug!("Box geometry skipped {skipped} non-manifold facets");
        }

        Self { facets }
    }

    /// Geometry of an interior facet, `None` for boundary or skipped facets.
    #[inline]
    pub fn facet(&self, facet: usize) -> Option<FacetGeometry> {
        self.facets.get(facet).copied().flatten()
    }

    pub fn num_facets(&self) -> usize {
        self.facets.len()
    }

    pub fn num_interior(&self) -> usize {
        self.facets.iter().filter(|f| f.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::{create_line_mesh, create_regular_2d_grid};
    use crate::discretization::mesh::{Cell, Face, Mesh};

    #[test]
    fn orthogonal_line_has_full_area() {
        let mesh = create_line_mesh(1.0, 4, 2.0);
        let geom = BoxGeometry::compute(&mesh);
        assert_eq!(geom.num_interior(), 3);
        for face in 1..4 {
            let g = geom.facet(face).expect("interior");
            assert!((g.distance - 0.25).abs() < 1e-14);
            assert!((g.effective_area - 2.0).abs() < 1e-14);
        }
        assert!(geom.facet(0).is_none());
        assert!(geom.facet(4).is_none());
    }

    #[test]
    fn grid_interior_facets() {
        let mesh = create_regular_2d_grid([1.0, 1.0], 3, 3, 1.0);
        let geom = BoxGeometry::compute(&mesh);
        // 2 interior x-faces per row, 2 interior y-faces per column
        assert_eq!(geom.num_interior(), 2 * 3 + 2 * 3);
    }

    #[test]
    fn skewed_connection_reduces_area() {
        // Two unit cells whose centroids are offset in y relative to the facet
        let mesh = Mesh {
            cells: vec![
                Cell {
                    id: 0,
                    volume: 1.0,
                    centroid: [0.0, 0.0, 0.0],
                    face_ids: vec![0],
                },
                Cell {
                    id: 1,
                    volume: 1.0,
                    centroid: [1.0, 1.0, 0.0],
                    face_ids: vec![0],
                },
            ],
            faces: vec![Face {
                area: 1.0,
                normal: [1.0, 0.0, 0.0],
                cell_ids: vec![0, 1],
                centroid: [0.5, 0.5, 0.0],
            }],
            nodes: vec![],
        };
        let g = BoxGeometry::compute(&mesh).facet(0).expect("interior");
        let d = 2.0_f64.sqrt();
        assert!((g.distance - d).abs() < 1e-14);
        assert!((g.effective_area - 1.0 / d).abs() < 1e-14);
    }

    #[test]
    fn non_manifold_facet_is_skipped() {
        let cell = |id: usize, x: f64| Cell {
            id,
            volume: 1.0,
            centroid: [x, 0.0, 0.0],
            face_ids: vec![0],
        };
        let mesh = Mesh {
            cells: vec![cell(0, 0.0), cell(1, 1.0), cell(2, 2.0)],
            faces: vec![Face {
                area: 1.0,
                normal: [1.0, 0.0, 0.0],
                cell_ids: vec![0, 1, 2],
                centroid: [0.5, 0.0, 0.0],
            }],
            nodes: vec![],
        };
        let geom = BoxGeometry::compute(&mesh);
        assert!(geom.facet(0).is_none());
        assert_eq!(geom.num_interior(), 0);
    }
}
