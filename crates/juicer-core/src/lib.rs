//! juicer-core: status transition detection for live issue-tracker pages.
//!
//! The crate watches a page for a status field moving into one of a small
//! set of "success" values and dispatches a celebratory effect exactly once
//! per qualifying edge. It covers two observation surfaces:
//!
//! - the **detail** surface: a single status element that the page may
//!   replace at any time
//! - the **rows** surface: an unbounded, reordering collection of per-row
//!   status controls
//!
//! # Quick Start
//!
//! ```ignore
//! use juicer_core::config::WatcherSettings;
//! use juicer_core::effects::{register_confetti_presets, EffectRegistry};
//! use juicer_core::page::SimulatedPage;
//! use juicer_core::watcher::Watcher;
//!
//! let page = SimulatedPage::new("/browse/PROJ-1");
//! let mut registry = EffectRegistry::new();
//! register_confetti_presets(&mut registry, renderer, None);
//!
//! let watcher = Watcher::new(page.clone(), WatcherSettings::default(), registry)?;
//! let mut rx = watcher.subscribe();
//! let shutdown = watcher.shutdown_handle();
//! tokio::spawn(watcher.run());
//! ```

pub mod config;
pub mod effects;
pub mod events;
pub mod observe;
pub mod page;
pub mod status;
pub mod tracker;
pub mod watcher;
