//! UI layer for the widget: app shell and native window control.

pub mod app;
pub mod window;

pub use app::{StartupConfig, WidgetApp};
