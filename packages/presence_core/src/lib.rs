//! Presence Core - sans-IO building blocks for a shared-canvas presence channel
//!
//! This crate holds every piece of the live-presence channel that does not
//! touch a socket or a timer: the connection lifecycle state machine, the
//! wire protocol, the per-source presence table, and the send gate that
//! bounds outbound traffic. Runtime integration lives in `canvas_presence`.
//!
//! Time is always passed in as an [`std::time::Instant`], so every type here
//! can be driven deterministically from tests.
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use presence_core::{PresenceTable, decode_relayed};
//!
//! let mut table = PresenceTable::new();
//! let update = decode_relayed(r#"{"status":"success","x":10,"y":20,"source":"abc"}"#, false)
//!     .unwrap();
//! table.apply(update, Instant::now());
//! assert_eq!(table.get("abc").map(|e| (e.x, e.y)), Some((10, 20)));
//! ```

mod error;
pub mod grid;
pub mod lifecycle;
pub mod pointer;
pub mod presence;
pub mod protocol;
pub mod throttle;

pub use error::InboundError;
pub use grid::CanvasGrid;
pub use lifecycle::{ConnectionLifecycle, ConnectionState, Directive, TransportEvent};
pub use pointer::{LocalPointer, SelectionSet};
pub use presence::{PresenceEntry, PresenceSnapshot, PresenceTable, Position};
pub use protocol::{OutboundMessage, PresenceUpdate, WireFormat, decode_relayed};
pub use throttle::SendGate;
