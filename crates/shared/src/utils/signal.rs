use tokio::{
    io,
    signal::unix::{signal, SignalKind},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// Cancels `token` on the first SIGTERM, SIGINT, SIGHUP or SIGQUIT so that
/// scheduler and monitor loops stop before their next tick.
pub fn cancel_on_shutdown_signal(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigquit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
            _ = sigquit.recv() => "SIGQUIT",
            _ = token.cancelled() => return,
        };
        log::info!("Received {name}, shutting down keeper loops");
        token.cancel();
    }))
}
