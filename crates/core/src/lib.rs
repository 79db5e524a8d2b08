//! Core logic for barrio-push.
//!
//! Change events come in, get typed by the [`TriggerRouter`], resolved to
//! localized push messages, sent to the gateway in chunks and finally
//! reconciled against delivery receipts.

pub mod services;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use services::*;
