//! # sxkcd Common Library
//!
//! Shared code for the sxkcd acquisition pipeline and its collaborators:
//! - Canonical comic record and result set
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{Comic, ComicSet};
