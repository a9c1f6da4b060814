pub mod compressor;
pub mod screenshot;
pub mod target;
pub mod types;
