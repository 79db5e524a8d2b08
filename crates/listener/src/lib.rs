//! Change event ingress for barrio-push.
//!
//! The data store publishes one JSON [`ChangeEvent`](barrio_core::ChangeEvent)
//! per document write on a Redis Pub/Sub channel. The listener decodes each
//! message and hands it to a [`ChangeHandler`] on its own task. Those tasks
//! live in an [`EventTasks`] set so shutdown can wait for them.

pub mod pubsub;
pub mod tasks;

pub use pubsub::{ChangeHandler, ChangeListener, decode_change, dispatch_payload};
pub use tasks::EventTasks;
