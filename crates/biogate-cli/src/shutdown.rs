//! Stop signals.
//!
//! SIGINT and SIGTERM both cancel the running command, so the grant line
//! guard de-asserts the line before the process exits.

use std::future::Future;
use std::io;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl StopSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
        }
    }
}

/// Installed stop-signal handlers. Handlers are registered on
/// [`install`](Self::install), so no signal is lost between installing and
/// waiting.
#[derive(Debug)]
pub struct StopSignals {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl StopSignals {
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Fails if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves on the first stop signal.
    ///
    /// # Errors
    /// Fails if the signal stream closes.
    #[cfg(unix)]
    pub async fn recv(mut self) -> io::Result<StopSignal> {
        let received = tokio::select! {
            s = self.interrupt.recv() => s.map(|()| StopSignal::Interrupt),
            s = self.terminate.recv() => s.map(|()| StopSignal::Terminate),
        };
        received.ok_or_else(|| io::Error::other("signal stream closed"))
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> io::Result<StopSignal> {
        signal::ctrl_c().await.map(|()| StopSignal::Interrupt)
    }
}

/// Cancel `cancel` once `stop` yields a signal. A failed listener is logged
/// and leaves the token untouched.
pub async fn cancel_on<F>(stop: F, cancel: CancellationToken)
where
    F: Future<Output = io::Result<StopSignal>>,
{
    match stop.await {
        Ok(signal) => {
            info!(signal = signal.as_str(), "Stop signal received, stopping");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Cannot listen for stop signals"),
    }
}

/// Install the handlers and cancel `cancel` on SIGINT or SIGTERM.
///
/// # Errors
/// Fails if a handler cannot be registered.
pub fn spawn_watcher(cancel: CancellationToken) -> io::Result<()> {
    let signals = StopSignals::install()?;
    tokio::spawn(cancel_on(signals.recv(), cancel));
    Ok(())
}
