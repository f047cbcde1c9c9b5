pub mod geo;
pub mod image;
pub mod office;
