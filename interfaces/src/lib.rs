//! Boundary Interfaces Library
//!
//! Defines the narrow set of message and result types that cross the
//! scheduler core's boundary: PHY timing notifications coming in, committed
//! `sched_result`s going out to the PHY, opaque upward control-plane
//! messages to/from the core network side, and a write-only PCAP-style
//! trace sink.

pub mod message_types;
pub mod sched_result;
pub mod pcap;

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid message format")]
    InvalidMessage,

    #[error("Interface not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sink unavailable")]
    SinkUnavailable,
}
