//! # CompileNet Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # SimNetwork: several TestNodes wired by frame routing
//! └── integration/
//!     ├── delegation.rs # request → data → result across nodes
//!     ├── groups.rs     # group slot queries and proof replay
//!     └── live.rs       # two NodeRuntimes over loopback TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cn-tests
//! cargo test -p cn-tests integration::groups::
//! ```

pub mod harness;
pub mod integration;

pub use harness::SimNetwork;
