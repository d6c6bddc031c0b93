//! Anteprima: the core of a live Markdown preview surface.
//!
//! The crate has two responsibilities. The render pipeline turns a document
//! snapshot into sanitised HTML through three ordered stages (structural
//! Markdown transform, fenced-code highlighting, math typesetting) and a
//! session object keeps delivered output consistent with the newest edit.
//! The asset provisioner makes sure the stylesheet and font assets those
//! stages depend on exist under a local root before they are needed.
//!
//! Host shells (a server-rendered page, a desktop tab, the bundled CLI) drive
//! the core through [`application::render::RenderSynchronizer`] and
//! [`infra::provisioner::AssetProvisioner`]; everything else is plumbing.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
