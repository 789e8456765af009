//! Common test infrastructure
//!
//! In-memory collaborators and a ready-made [`JobContext`] backed by a real
//! SQLite store in a temporary directory. Tests should only import from this
//! module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestEnv;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let env = TestEnv::new();
//!     let settings = env.store.get().unwrap();
//!     assert!(!settings.daily_post.active);
//! }
//! ```

mod constants;
mod fakes;

// Public API - this is what tests import
pub use constants::*;
pub use fakes::{RecordingNotifier, Sent, TestEnv};
