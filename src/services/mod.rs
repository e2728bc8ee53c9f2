pub mod staging;
pub mod transform;
