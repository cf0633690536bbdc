//! A blocking client for streaming [Databento Binary Encoding (DBN)](https://databento.com/docs/standards-and-conventions/databento-binary-encoding)
//! records from a live subscription gateway.
//!
//! A session is created and authenticated with [`LiveBuilder`], sends one or more
//! [`Subscription`]s, is started to receive its [`dbn::Metadata`], then yields records
//! one at a time through [`Client::next_record()`] until stopped. [`ThreadedClient`]
//! runs the same loop on a background thread with callbacks.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::missing_errors_doc)]

mod buffer;
mod builder;
mod client;
pub mod error;
pub mod protocol;
#[cfg(test)]
mod test_utils;
mod threaded;
pub mod transport;

pub use crate::{
    buffer::RecordBuffer,
    builder::{LiveBuilder, API_KEY_ENV_VAR},
    client::{Client, ClientState},
    error::{Error, Result},
    protocol::{Subscription, SubscriptionStart},
    threaded::{KeepGoing, ThreadedClient},
    transport::{ReadResult, ReadStatus, ShutdownHandle, TcpTransport, Transport},
};
