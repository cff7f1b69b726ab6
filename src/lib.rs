//! linemark: line bookmarks that survive branch switches.
//!
//! Bookmarks are kept in a tree of groups and point at a line of a text file. When the files
//! change underneath them, typically because a different branch was checked out, a
//! reconciliation pass asks the host where each bookmark's anchor is now, corrects the lines
//! that moved, drops the bookmarks whose anchor is gone, and saves the result after a short
//! delay.
#![allow(clippy::multiple_crate_versions)]

pub mod anchor;
pub mod config;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod host;
pub mod model;
pub mod persist;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod watch;

pub use error::{Error, Result};
