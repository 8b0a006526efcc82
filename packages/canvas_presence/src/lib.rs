//! Canvas Presence - live cursor presence over a relay WebSocket
//!
//! A [`PresenceChannel`] keeps one connection to the relay alive (fixed-delay
//! reconnect, forever), publishes the local pointer at a bounded rate, and
//! merges relayed positions into a per-source presence table that renderers
//! read through watch channels.
//!
//! # Example
//!
//! ```no_run
//! use canvas_presence::{ChannelConfig, PresenceChannel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let channel = PresenceChannel::connect(ChannelConfig::default());
//!
//!     channel.move_pointer(120, 48);
//!     channel.click_box(7);
//!
//!     let mut presence = channel.watch_presence();
//!     while presence.changed().await.is_ok() {
//!         for cursor in &presence.borrow().entries {
//!             println!("{}: ({}, {})", cursor.source, cursor.x, cursor.y);
//!         }
//!     }
//!
//!     channel.teardown().await;
//! }
//! ```

pub mod channel;
pub mod config;
pub mod publisher;
pub mod store;
#[cfg(test)]
mod test_helpers;
pub mod transport;

pub use channel::PresenceChannel;
pub use config::{ChannelConfig, FileConfig};
pub use presence_core::{ConnectionState, LocalPointer, PresenceEntry, PresenceSnapshot};
pub use transport::{Connector, Frame, Transport, TransportError, WsConnector};
