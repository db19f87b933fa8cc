mod arc;
mod bounding_box;
mod rotation;

pub use arc::*;
pub use bounding_box::*;
pub use rotation::*;
