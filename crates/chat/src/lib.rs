//! Streaming chat for glimpse.
//!
//! [`ChatDispatcher`] turns a query into a stream of cumulative snapshots
//! tagged with a [`StreamId`]. All streams share one subscription channel;
//! consumers keep only the stream they trust with [`ActiveStream`].

pub mod active;
pub mod dispatcher;
pub mod hub;
pub mod session;
pub mod stream_event;

pub use active::ActiveStream;
pub use dispatcher::{ChatDispatcher, ChatQuery};
pub use hub::Subscription;
pub use session::{SessionRegistry, StreamState};
pub use stream_event::{StreamEvent, StreamId};
