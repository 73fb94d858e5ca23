#![forbid(unsafe_code)]

//! Compiles a declarative clip list into FFmpeg `filter_complex` render
//! passes: a cross-faded picture track, a ledger-synchronized audio mix,
//! and time-gated overlay stages, all emitted deterministically.

pub mod assemble;
pub mod audio;
pub mod context;
pub mod core;
pub mod error;
pub mod gaps;
pub mod gradient;
pub mod graph;
pub mod ledger;
pub mod model;
pub mod motion;
pub mod overlay;
pub mod picture;
pub mod probe;
pub mod subtitle;

pub use crate::assemble::{ExportPlan, RenderPass, compile};
pub use crate::context::{CompileConfig, CompileContext};
pub use crate::core::{Canvas, Window};
pub use crate::error::{CinegraphError, CinegraphResult};
pub use crate::model::Clip;
pub use crate::probe::{FfprobeProber, MediaInfo, MediaProber};
