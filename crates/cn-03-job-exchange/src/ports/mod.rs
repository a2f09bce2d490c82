//! # Ports Layer
//!
//! - **Driving (inbound):** [`JobExchangeApi`] and the [`NetworkEvent`] it
//!   consumes
//! - **Driven (outbound):** transport, compiler executor, file store, clock
//!   and event sink

pub mod inbound;
pub mod outbound;

pub use inbound::{JobExchangeApi, NetworkEvent};
pub use outbound::{
    CompilerExecutor, ExecuteRequest, FileStore, JobEventSink, JobExchangeEvent,
    PreprocessRequest, TimeSource, Transport, TransportError,
};
