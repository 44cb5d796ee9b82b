//! Shared utilities

pub mod config;
pub mod context;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod process;

pub use config::Config;
pub use context::GlobalContext;
