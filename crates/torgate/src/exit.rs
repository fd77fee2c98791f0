//! Detect a "ctrl-c" notification or other reason to exit.

use crate::Result;

/// Wait until a control-c notification is received, using an appropriate
/// runtime mechanism.
///
/// This function can have pretty kludgey side-effects: see
/// documentation for `tokio::signal::ctrl_c`.
pub(crate) async fn wait_for_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
