//! Shared resources for bundle assembly.

pub mod icons;
