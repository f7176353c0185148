use crate::config::{ChannelConfig, ChannelMode};
use crate::error::ChannelError;
use crate::oneshot::OneShotChannel;
use crate::response::ToolResponse;
use crate::session::SessionChannel;

/// A way of running the metadata tool with a list of arguments.
///
/// Implementations own their processes. `close` releases them and is
/// idempotent; dropping an unclosed channel closes it as well.
pub trait ProcessChannel: Send + Sync {
    /// Run the tool once with `args` and block until its response is
    /// complete.
    fn call(&self, args: &[String]) -> Result<ToolResponse, ChannelError>;

    fn mode(&self) -> ChannelMode;

    fn close(&self) -> Result<(), ChannelError>;
}

/// Open the channel implementation selected by `config.mode`.
pub fn open_channel(config: &ChannelConfig) -> Result<Box<dyn ProcessChannel>, ChannelError> {
    let channel: Box<dyn ProcessChannel> = match config.mode {
        ChannelMode::Session => Box::new(SessionChannel::open(config)?),
        ChannelMode::Pool => Box::new(OneShotChannel::new(config)),
    };
    tracing::debug!(mode = %config.mode, program = %config.program.display(), "exiftool channel opened");
    Ok(channel)
}
