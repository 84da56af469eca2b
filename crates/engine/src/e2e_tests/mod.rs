//! End-to-end tests of the extension.
//!
//! These tests drive the full event flow through the in-memory hub:
//! - The extension dispatches request records and edge requests
//! - The harness answers as the edge transport would
//! - Results are observed through the public API and the hub history
//!
//! # Running
//!
//! ```bash
//! cargo test -p optimize-engine --lib e2e_tests
//! ```

mod e2e_helpers;
