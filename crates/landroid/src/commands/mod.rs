//! Command dispatch: bridges CLI args -> core client calls -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod status;

use landroid_core::ClientConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(config, &args, global).await,
        Command::Devices => devices::list(config, global).await,
        Command::Whoami => devices::whoami(config, global).await,
        Command::Config(_) | Command::Completions(_) => unreachable!("handled in main"),
    }
}
