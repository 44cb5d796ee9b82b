//! High-level operations.
//!
//! This module contains the implementation of Capstan commands.

pub mod doctor;
pub mod install;

pub use doctor::{doctor, format_report, DoctorReport};
pub use install::{install, InstallOptions, InstallOutcome};
