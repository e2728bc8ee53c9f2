pub mod staging;
pub mod transformer;
