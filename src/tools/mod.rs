pub mod command;
pub mod git;
pub mod npm;

pub use git::{GitCli, VersionControl};
pub use npm::{NpmCli, Packager, tarball_name};
