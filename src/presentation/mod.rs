//! Naming helpers for clients rendering cached contents.

pub mod templates;
pub mod widget;

pub use templates::{TemplateKind, template_candidates};
pub use widget::{fetch_url, widget_id};
