pub mod publisher;
pub mod scratch;

pub use publisher::{Publisher, publish, publish_legacy};
pub use scratch::ScratchWorkspace;
