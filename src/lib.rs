//! Capstan - a cached, crash-safe installer for configure/make packages
//!
//! This crate provides the core library functionality for Capstan:
//! locator-keyed build caching, archive resolution with conditional
//! refetching, in-cache builds, and promotion of finished trees into a
//! live install path with automatic backups.

pub mod builder;
pub mod cache;
pub mod core;
pub mod installer;
pub mod ops;
pub mod sources;
pub mod util;

pub use crate::cache::{BuildCache, CacheEntry};
pub use crate::core::{Freshness, Locator};
pub use crate::util::context::GlobalContext;
