//! Frame enhancement before analysis.
//!
//! Captured frames get a fixed contrast boost, a mild saturation boost and
//! a slight blur to knock down sensor noise, then are re-encoded as JPEG.
//! The pass is best-effort: a frame that cannot be processed is submitted
//! as captured.

mod enhance;

pub use enhance::{PreprocessConfig, PreprocessError, Preprocessor};
