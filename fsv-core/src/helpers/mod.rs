//! Low-level helper utilities.

pub mod hash;
pub mod pattern;
pub mod clock;
pub mod paths;
