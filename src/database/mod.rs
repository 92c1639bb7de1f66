pub mod installer;
pub mod schema;
