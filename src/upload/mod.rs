//! Upload coordination
//!
//! Concurrent uploads targeting the same file key race to finish; the
//! registry here broadcasts the first completion so the others can stop
//! reading their request bodies.

mod listener;

pub use listener::{ReceiveListenerRegistry, ReceiverChannel};
