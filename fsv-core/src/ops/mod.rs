//! High-level operations.

mod capture;
mod diff;

pub use capture::{capture, capture_with, CaptureOptions};
pub use diff::{diff, diff_with_reference};
