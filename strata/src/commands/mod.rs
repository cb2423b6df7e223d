//! Command implementations for the strata CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod dimensions;
pub mod doctor;
pub mod packs;
pub mod simulate;
