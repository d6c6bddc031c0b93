//! The render-synchronisation pipeline.
//!
//! `service` holds the pure three-stage pipeline (structural transform,
//! highlighting, math typesetting); `synchronizer` owns revision ordering and
//! delivery. The pipeline is deterministic: state changes such as asset
//! provisioning happen in the caller before the service is constructed.

mod service;
mod synchronizer;
mod types;

pub use service::{ComrakRenderService, RenderPipelineConfig};
pub use synchronizer::{RenderFeed, RenderSynchronizer};
pub use types::{RenderError, RenderResult, RenderService};
