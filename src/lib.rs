pub mod archive;
pub mod core;
pub mod orchestration;
pub mod tools;

pub use self::core::*;
pub use orchestration::{Publisher, publish, publish_legacy};
pub use tools::{GitCli, NpmCli, Packager, VersionControl};
