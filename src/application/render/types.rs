use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::document::{DocumentSnapshot, Revision};

/// Deterministic rendering result for one document snapshot.
///
/// The `highlight_applied` and `math_applied` flags report whether the
/// corresponding sub-stage ran; a skipped stage (missing assets) leaves its
/// flag false and appends a warning rather than failing the render. A result
/// is superseded by any result with a higher revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub revision: Revision,
    pub html_fragment: String,
    pub highlight_applied: bool,
    pub math_applied: bool,
    pub warnings: Vec<String>,
}

/// Structured errors raised by individual pipeline stages. These never escape
/// [`RenderService::render`]: each stage degrades to a literal fallback and a
/// warning instead.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("math typesetting failed: {message}")]
    Math { message: String },
    #[error("document rewriting failed: {message}")]
    Document { message: String },
}

/// Trait exposed by the rendering pipeline. Implementations must be pure and
/// deterministic: given the same snapshot and asset availability, they return
/// identical output. The render itself is infallible; degradation is
/// expressed through the result's flags and warnings.
pub trait RenderService: Send + Sync {
    fn render(&self, snapshot: &DocumentSnapshot) -> RenderResult;
}
