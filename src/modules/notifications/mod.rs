//! Real-time delivery over WebSockets.
//!
//! The [`hub::NotificationHub`] lives in `AppState`. Services publish to it
//! and never wait on delivery; [`ws`] owns the socket side.

pub mod events;
pub mod hub;
pub mod router;
pub mod ws;
