use glam::DVec3;

/// The complete computational grid.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
}

/// A single control volume (a Voronoi box).
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub face_ids: Vec<usize>,
}

/// An interface between cells.
#[derive(Clone, Debug)]
pub struct Face {
    pub area: f64,
    /// Unit normal pointing out of `cell_ids[0]`.
    pub normal: [f64; 3],
    /// Cells sharing this face. One entry for a boundary face, two for an
    /// interior face. Anything else is a degenerate (non-manifold) face.
    pub cell_ids: Vec<usize>,
    pub centroid: [f64; 3],
}

#[derive(Clone, Debug)]
pub struct Node {
    pub position: [f64; 3],
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    #[error("cell {cell} references face {face}, which does not exist")]
    MissingFace { cell: usize, face: usize },
    #[error("face {face} references cell {cell}, which does not exist")]
    MissingCell { face: usize, cell: usize },
    #[error("face {face} lists cell {cell}, but the cell does not list the face")]
    Asymmetric { face: usize, cell: usize },
    #[error("cell {0} has id {1}, ids must match positions")]
    IdMismatch(usize, usize),
}

/// Read-only topology and geometry queries the finite volume core relies on.
pub trait MeshTopology {
    fn num_cells(&self) -> usize;
    fn num_facets(&self) -> usize;
    fn facets_of_cell(&self, cell: usize) -> &[usize];
    fn cells_of_facet(&self, facet: usize) -> &[usize];
    fn cell_volume(&self, cell: usize) -> f64;
    fn facet_measure(&self, facet: usize) -> f64;
    fn cell_centroid(&self, cell: usize) -> DVec3;
    fn facet_centroid(&self, facet: usize) -> DVec3;
    /// Unit normal of `facet` pointing out of `cell`.
    fn outward_normal(&self, facet: usize, cell: usize) -> DVec3;

    /// The cell on the other side of `facet`, if the facet is interior.
    fn neighbor_across(&self, facet: usize, cell: usize) -> Option<usize> {
        match self.cells_of_facet(facet) {
            [a, b] if *a == cell => Some(*b),
            [a, b] if *b == cell => Some(*a),
            _ => None,
        }
    }
}

impl MeshTopology for Mesh {
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn num_facets(&self) -> usize {
        self.faces.len()
    }

    fn facets_of_cell(&self, cell: usize) -> &[usize] {
        &self.cells[cell].face_ids
    }

    fn cells_of_facet(&self, facet: usize) -> &[usize] {
        &self.faces[facet].cell_ids
    }

    fn cell_volume(&self, cell: usize) -> f64 {
        self.cells[cell].volume
    }

    fn facet_measure(&self, facet: usize) -> f64 {
        self.faces[facet].area
    }

    fn cell_centroid(&self, cell: usize) -> DVec3 {
        DVec3::from_array(self.cells[cell].centroid)
    }

    fn facet_centroid(&self, facet: usize) -> DVec3 {
        DVec3::from_array(self.faces[facet].centroid)
    }

    fn outward_normal(&self, facet: usize, cell: usize) -> DVec3 {
        let face = &self.faces[facet];
        let n = DVec3::from_array(face.normal);
        if face.cell_ids.first() == Some(&cell) {
            n
        } else {
            -n
        }
    }
}

impl Mesh {
    /// Check that cells and faces reference each other consistently.
    pub fn validate(&self) -> Result<(), MeshError> {
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.id != idx {
                return Err(MeshError::IdMismatch(idx, cell.id));
            }
            for &face in &cell.face_ids {
                if face >= self.faces.len() {
                    return Err(MeshError::MissingFace { cell: idx, face });
                }
            }
        }
        for (idx, face) in self.faces.iter().enumerate() {
            for &cell in &face.cell_ids {
                let Some(c) = self.cells.get(cell) else {
                    return Err(MeshError::MissingCell { face: idx, cell });
                };
                if !c.face_ids.contains(&idx) {
                    return Err(MeshError::Asymmetric { face: idx, cell });
                }
            }
        }
        Ok(())
    }

    /// Faces with exactly one adjacent cell.
    pub fn boundary_faces(&self) -> impl Iterator<Item = (usize, &Face)> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.cell_ids.len() == 1)
    }

    /// Cells owning at least one boundary face whose centroid satisfies `pred`.
    pub fn cells_on_boundary<P>(&self, pred: P) -> Vec<usize>
    where
        P: Fn(DVec3) -> bool,
    {
        let mut cells: Vec<usize> = self
            .boundary_faces()
            .filter(|(_, f)| pred(DVec3::from_array(f.centroid)))
            .map(|(_, f)| f.cell_ids[0])
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}
