pub mod box_geometry;
pub mod generator;
pub mod mesh;
