//! Remote-write wire layer
//!
//! - `proto` - protobuf messages
//! - `encoding` - serialization and snappy compression
//! - `client` - HTTP transport (reqwest)
//! - `error` - encode and transport errors

mod client;
mod encoding;
mod error;
pub mod proto;

pub use client::{
    REMOTE_WRITE_VERSION, REMOTE_WRITE_VERSION_HEADER, RemoteWriteClient, RemoteWriteTransport,
};
pub use encoding::{EncodedBatch, encode_batch, write_request};
pub use error::{EncodeError, TransportError};
