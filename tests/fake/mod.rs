pub mod cluster;
pub mod resources;
