pub mod local;
pub mod remote;
pub mod resolver;
