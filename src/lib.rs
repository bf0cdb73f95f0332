//! Selector Studio - point-and-click selector building for scraper configurations
//!
//! This library provides:
//! - CSS selector synthesis for picked elements
//! - A preview inspector and the message channel back to the controller
//! - The selection store and its list view
//! - Configuration assembly and selector validation
//! - A client for the configuration service

pub mod config;
pub mod core;
pub mod dsl;
pub mod error;
pub mod inspector;
pub mod logging;
pub mod messenger;
pub mod selector;
pub mod service;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::core::SelectorStudio;
pub use crate::dsl::ScraperConfig;
pub use crate::error::{StudioError, StudioResult};
pub use crate::store::{Selection, SelectionStore};
