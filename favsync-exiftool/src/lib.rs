//! Process plumbing for the exiftool metadata tool.
//!
//! Two channel implementations share the [`ProcessChannel`] trait:
//! a stay-open [`SessionChannel`] that frames calls over one process's
//! pipes, and a [`OneShotChannel`] that starts a process per call.

pub mod channel;
pub mod config;
mod error;
pub mod frame;
pub mod oneshot;
pub mod response;
pub mod session;

pub use channel::{open_channel, ProcessChannel};
pub use config::{ChannelConfig, ChannelMode};
pub use error::ChannelError;
pub use oneshot::OneShotChannel;
pub use response::{ToolResponse, WriteSummary};
pub use session::SessionChannel;
