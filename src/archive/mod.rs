pub mod unpack;

pub use unpack::unpack_tarball;
