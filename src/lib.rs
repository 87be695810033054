//! headwatch - live chain head viewer
//!
//! This library is the aggregation core behind the `headwatch` terminal UI.
//! It follows a node's header stream, works out which authority produced each
//! block from the pre-runtime digest, and keeps bounded, deduplicated views of
//! recent headers and events.
//!
//! ## Architecture
//!
//! - **Core** (all targets): digest decoding, leader resolution, the bounded
//!   header window, event aggregation, the pause/resume viewport and the
//!   [`Session`] that folds incoming [`AppEvent`]s into all of them.
//! - **Native**: WebSocket sources and the crossterm/ratatui binary.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --node-ws-url ws://127.0.0.1:9944
//! ```

// Core modules (available on all platforms)
pub mod config;
pub mod constants;
pub mod types;
pub mod util_text;

// Decoding
pub mod digest;
pub mod header;

// Aggregation
pub mod events;
pub mod leader;
pub mod session;
pub mod viewport;
pub mod window;

// Node access (direct JSON-RPC over HTTP)
pub mod rpc_utils;
pub mod runtime;
pub mod sources;

pub mod ui;

// Platform-specific modules
#[cfg(feature = "native")]
pub mod source_events;
#[cfg(feature = "native")]
pub mod source_ws;

// Re-export commonly used types
pub use config::{Config, HeadMode};
pub use session::{fold, Command, HeaderRow, Session, SessionConfig};
pub use types::{AppEvent, AuxData, BlockHash, BlockHeader, EventBatch, RawEvent};
