use super::mesh::{Cell, Face, Mesh, Node};

/// Create a 1D chain of `num_cells` boxes covering `[0, length]` along x.
///
/// Face 0 is the left boundary, faces `1..num_cells` are interior and face
/// `num_cells` is the right boundary. Every face has area `cross_section`.
pub fn create_line_mesh(length: f64, num_cells: usize, cross_section: f64) -> Mesh {
    let h = length / num_cells as f64;
    let volume = h * cross_section;

    let mut cells: Vec<Cell> = (0..num_cells)
        .map(|i| Cell {
            id: i,
            volume,
            centroid: [(i as f64 + 0.5) * h, 0.0, 0.0],
            face_ids: Vec::with_capacity(2),
        })
        .collect();

    let mut faces = Vec::with_capacity(num_cells + 1);
    for i in 0..=num_cells {
        let x = i as f64 * h;
        let (cell_ids, normal) = if i == 0 {
            (vec![0], [-1.0, 0.0, 0.0])
        } else if i == num_cells {
            (vec![num_cells - 1], [1.0, 0.0, 0.0])
        } else {
            (vec![i - 1, i], [1.0, 0.0, 0.0])
        };
        for &c in &cell_ids {
            cells[c].face_ids.push(i);
        }
        faces.push(Face {
            area: cross_section,
            normal,
            cell_ids,
            centroid: [x, 0.0, 0.0],
        });
    }

    let nodes = cells
        .iter()
        .map(|c| Node {
            position: c.centroid,
        })
        .collect();

    Mesh {
        cells,
        faces,
        nodes,
    }
}

/// Create an orthogonal `nx` × `ny` grid of boxes covering
/// `[0, width[0]] × [0, width[1]]` with the given thickness in z.
///
/// Cell `(i, j)` has id `j * nx + i`.
pub fn create_regular_2d_grid(width: [f64; 2], nx: usize, ny: usize, thickness: f64) -> Mesh {
    let dx = width[0] / nx as f64;
    let dy = width[1] / ny as f64;
    let id = |i: usize, j: usize| j * nx + i;

    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            cells.push(Cell {
                id: id(i, j),
                volume: dx * dy * thickness,
                centroid: [(i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy, 0.0],
                face_ids: Vec::with_capacity(4),
            });
        }
    }

    let mut faces = Vec::new();
    let mut push_face = |cells: &mut Vec<Cell>, face: Face| {
        let face_id = faces.len();
        for &c in &face.cell_ids {
            cells[c].face_ids.push(face_id);
        }
        faces.push(face);
    };

    // Faces normal to x
    for j in 0..ny {
        let yc = (j as f64 + 0.5) * dy;
        for i in 0..=nx {
            let (cell_ids, normal) = if i == 0 {
                (vec![id(0, j)], [-1.0, 0.0, 0.0])
            } else if i == nx {
                (vec![id(nx - 1, j)], [1.0, 0.0, 0.0])
            } else {
                (vec![id(i - 1, j), id(i, j)], [1.0, 0.0, 0.0])
            };
            push_face(
                &mut cells,
                Face {
                    area: dy * thickness,
                    normal,
                    cell_ids,
                    centroid: [i as f64 * dx, yc, 0.0],
                },
            );
        }
    }

    // Faces normal to y
    for i in 0..nx {
        let xc = (i as f64 + 0.5) * dx;
        for j in 0..=ny {
            let (cell_ids, normal) = if j == 0 {
                (vec![id(i, 0)], [0.0, -1.0, 0.0])
            } else if j == ny {
                (vec![id(i, ny - 1)], [0.0, 1.0, 0.0])
            } else {
                (vec![id(i, j - 1), id(i, j)], [0.0, 1.0, 0.0])
            };
            push_face(
                &mut cells,
                Face {
                    area: dx * thickness,
                    normal,
                    cell_ids,
                    centroid: [xc, j as f64 * dy, 0.0],
                },
            );
        }
    }

    let nodes = cells
        .iter()
        .map(|c| Node {
            position: c.centroid,
        })
        .collect();

    Mesh {
        cells,
        faces,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_mesh_has_two_boundary_faces() {
        let mesh = create_line_mesh(2.0, 4, 0.5);
        assert_eq!(mesh.cells.len(), 4);
        assert_eq!(mesh.faces.len(), 5);
        assert_eq!(mesh.boundary_faces().count(), 2);
        assert!((mesh.cells[0].volume - 0.25).abs() < 1e-15);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn grid_face_counts() {
        let mesh = create_regular_2d_grid([1.0, 2.0], 3, 2, 1.0);
        assert_eq!(mesh.cells.len(), 6);
        // (nx + 1) * ny + (ny + 1) * nx
        assert_eq!(mesh.faces.len(), 4 * 2 + 3 * 3);
        assert_eq!(mesh.boundary_faces().count(), 2 * 2 + 2 * 3);
        let total: f64 = mesh.cells.iter().map(|c| c.volume).sum();
        assert!((total - 2.0).abs() < 1e-12);
        assert!(mesh.validate().is_ok());
        assert!(mesh.cells.iter().all(|c| c.face_ids.len() == 4));
    }
}
