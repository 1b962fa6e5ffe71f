//! Filesystem, archive, download, naming and process helpers.

pub mod archive;
pub mod fs;
pub mod http;
pub mod naming;
pub mod process;
