//! Library crate for the Linux memory lsof tool

// Allow clippy lints that would require significant refactoring
#![allow(clippy::new_without_default)]
#![allow(clippy::manual_range_contains)]

pub mod error;
pub mod kernel;
pub mod lsof;
pub mod memory;
pub mod symbols;
pub mod translation;

// Core modules
pub mod core {
    pub mod dwarf;
    pub mod offsets;
}

// CLI modules
pub mod cli {
    pub mod args;
}

pub mod formats;
pub mod plugins;
