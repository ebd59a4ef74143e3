//! Shutdown signals for `ultrafocus run`.

use log::debug;
use std::io;
use tokio::runtime::Builder;

/// Block the calling thread until SIGINT or SIGTERM arrives.
pub fn wait_for_signal() -> io::Result<()> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(shutdown_signal())
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            debug!("Received SIGINT");
        }
        _ = sigterm.recv() => debug!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    debug!("Received Ctrl-C");
    Ok(())
}
