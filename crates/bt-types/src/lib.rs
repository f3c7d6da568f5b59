pub mod config;
pub mod dimension;
pub mod errors;

pub use config::*;
pub use dimension::*;
pub use errors::*;
