//! Prometheus remote-write wire format.
//!
//! Converts batches of write queries into the remote-write payload: the
//! protobuf `WriteRequest` message compressed with snappy. The forwarder
//! treats the result as opaque bytes.

mod encode;
pub mod proto;

pub use self::encode::{EncodeError, decode, encode};
