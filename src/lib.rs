//! # Studyshelf
//!
//! A small server for sharing PDF study resources. Users upload and review
//! resources and earn contribution points, levels and badges that feed a
//! public leaderboard and profile pages.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! studyshelf = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use studyshelf::server::{AppState, create_router};
//! use studyshelf::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/studyshelf.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), Path::new("./data"), 20 * 1024 * 1024));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod scoring;
pub mod server;
pub mod service;
pub mod storage;
pub mod store;
pub mod types;
