//! content-relay - republishes uploaded files into a GitHub repository
//!
//! This crate provides:
//! - `POST /upload`: stage a multipart file, commit it through the GitHub
//!   contents API and return its public URL
//! - `DELETE /delete`: remove a previously published file
//! - Round-robin rotation over a pool of GitHub tokens
//! - A staging area that is always cleaned up, with a startup sweep for crash leftovers

pub mod api;
pub mod config;
pub mod content_store;
pub mod publish;
pub mod retry;
pub mod rotator;
pub mod staging;

use std::sync::Arc;

use config::Config;
use rotator::TokenRotator;
use staging::Staging;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub content_store: Arc<dyn content_store::ContentStore>,
    pub rotator: TokenRotator,
    pub staging: Staging,
}
