//! Category hierarchy ("classes") feature.
//!
//! Classes form a forest keyed by stable codes. Each class carries a
//! materialized ancestor path for subtree queries, per-locale display
//! names, and an active/inactive status gating whether new places may
//! reference it.

pub mod dtos;
pub mod models;
pub mod services;

pub use services::ClassService;
