//! Test helper modules for sxkcd-dl integration tests
//!
//! - MockUpstream: in-process xkcd + explainxkcd server with request counting

#![allow(dead_code)]

pub mod mock_upstream;

pub use mock_upstream::{test_settings, Canned, MockUpstream};
