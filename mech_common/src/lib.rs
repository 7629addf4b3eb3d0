//! Mech Common Library
//!
//! Shared constants, configuration loading, and hardware capability traits
//! for the mech-core workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Workspace-wide defaults and parameter bounds
//! - [`config`] - TOML configuration types with validation
//! - [`io`] - Opaque actuator/sensor capability traits

pub mod config;
pub mod consts;
pub mod io;
