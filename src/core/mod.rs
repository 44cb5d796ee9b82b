//! Core domain types

pub mod freshness;
pub mod locator;

pub use freshness::Freshness;
pub use locator::Locator;
