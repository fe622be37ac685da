//! Data layer
//!
//! - `types` - inbound metric model and outbound series model
//! - `remote_write` - protobuf encoding and HTTP transport

pub mod remote_write;
pub mod types;
