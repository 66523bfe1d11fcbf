//! Domain layer

pub mod aggregates;
pub mod value_objects;

pub use aggregates::*;
pub use value_objects::*;
