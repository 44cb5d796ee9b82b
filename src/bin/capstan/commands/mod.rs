//! Command implementations

pub mod cache;
pub mod completions;
pub mod doctor;
pub mod install;
