pub mod coordinates;
pub mod metadata;
pub mod paths;
