#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)] // TODO(deps-001): remove once transitive dependencies converge.

//! Message delivery and reconciliation for Roomline chat rooms.
//!
//! Three producers feed a room's messages: the [`factory`] builds optimistic
//! entries while the [`gateway`] persists them, the [`fetcher`] loads history,
//! and the [`listener`] appends realtime deliveries. [`reconcile`] folds the
//! three collections into the ordered, deduplicated groups a view renders.
//! [`room::RoomSession`] wires them together for a single room.

pub mod backend;
pub mod collection;
pub mod error;
pub mod factory;
pub mod fetcher;
pub mod gateway;
pub mod listener;
pub mod notify;
pub mod reconcile;
pub mod room;

pub use collection::MessageCollection;
pub use error::{RealtimeError, StoreError};
pub use room::RoomSession;
