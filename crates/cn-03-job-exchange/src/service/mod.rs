//! # Job Exchange Service
//!
//! Wires the domain records to the driven ports and implements
//! [`JobExchangeApi`](crate::ports::JobExchangeApi).
//!
//! | Submodule   | Handles                                                   |
//! |-------------|-----------------------------------------------------------|
//! | `core`      | state, peer connect/disconnect, timers, helpers           |
//! | `dispatch`  | packet decoding and routing                               |
//! | `outgoing`  | request creation, delegation, results of shipped jobs     |
//! | `incoming`  | accepting requests, executing jobs for peers              |
//! | `resources` | slot advertisements, group proofs, node status            |
//! | `api`       | the inbound port                                          |
//!
//! Every handler runs to completion on the caller's thread. Long work is
//! started through a port and comes back as a later
//! [`NetworkEvent`](crate::ports::NetworkEvent).

mod api;
mod core;
mod dispatch;
mod incoming;
mod outgoing;
mod resources;

pub use core::{JobExchangePorts, JobExchangeService};
