pub mod error;
pub mod manifest;
pub mod params;

pub use error::*;
pub use manifest::*;
pub use params::*;
