pub mod assembly;
pub mod backend;
pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
pub mod ids;
pub mod library;
pub mod math;
pub mod params;
pub mod selection;
pub mod template;

pub use error::{PartforgeError, Result};
