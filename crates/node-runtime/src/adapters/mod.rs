//! # Adapter Implementations
//!
//! Concrete implementations of the job exchange's driven ports:
//!
//! | Adapter              | Port               | Backing                     |
//! |----------------------|--------------------|-----------------------------|
//! | [`TcpTransport`]     | `Transport`        | tokio TCP, framed packets   |
//! | [`ProcessExecutor`]  | `CompilerExecutor` | compiler subprocesses       |
//! | [`ScratchFileStore`] | `FileStore`        | local filesystem            |
//! | [`SystemTimeSource`] | `TimeSource`       | wall clock                  |
//! | [`ChannelEventSink`] | `JobEventSink`     | tokio mpsc                  |
//!
//! Every adapter that produces asynchronous results posts them as a
//! `NetworkEvent` on the runtime's event channel, so the state machine only
//! ever runs on the runtime task.

pub mod events;
pub mod executor;
pub mod files;
pub mod tcp;
pub mod time;

pub use events::ChannelEventSink;
pub use executor::ProcessExecutor;
pub use files::ScratchFileStore;
pub use tcp::{TcpTransport, DEFAULT_MAX_FRAME};
pub use time::SystemTimeSource;
