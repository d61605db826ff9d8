//! Derived analysis over step outputs.
//!
//! Diagnostics over a loading timeline, the mock timeline generator and
//! the Core Web Vitals score.

pub mod diagnostics;
pub mod scoring;
pub mod timeline;

pub use diagnostics::analyze_diagnostics;
pub use scoring::{performance_score, score_label};
pub use timeline::generate_timeline;
