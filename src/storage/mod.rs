pub mod artifact;
pub mod checksum;
pub mod frames;
pub mod workdir;
