//! Where trapped signals come from.
//!
//! [OsSignals] listens for real process signals through tokio. [ManualSignals]
//! lets tests and embedding hosts raise signals themselves.

use color_eyre::{eyre::eyre, Report};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::signal::Signal;

/// Stream of received signals, restricted to the registered set.
pub type SignalStream = BoxStream<'static, Signal>;

/// A source of signals a [Trap](super::Trap) can subscribe to.
pub trait SignalSource {
    /// Register interest in `signals`.
    ///
    /// Registration is complete when this returns, so a signal raised
    /// afterwards is buffered until the stream is polled. An empty set
    /// yields a stream that never produces a signal.
    fn listen(&self, signals: &[Signal]) -> Result<SignalStream, Report>;
}

/// Process signals delivered by the operating system.
///
/// Listening installs process-wide handlers and must happen inside a tokio
/// runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

#[cfg(unix)]
impl SignalSource for OsSignals {
    fn listen(&self, signals: &[Signal]) -> Result<SignalStream, Report> {
        use tokio::signal::unix::signal;

        if signals.is_empty() {
            return Ok(stream::pending::<Signal>().boxed());
        }

        let mut streams = Vec::with_capacity(signals.len());
        for &wanted in signals {
            let listener = signal(wanted.kind()).map_err(|err| {
                eyre!("failed to install {} handler: {err}", wanted.constant())
            })?;
            let received = stream::unfold(listener, move |mut listener| async move {
                listener.recv().await.map(|()| (wanted, listener))
            });
            streams.push(received.boxed());
        }

        Ok(stream::select_all(streams).boxed())
    }
}

/// Off Unix only `Interrupt` (Ctrl-C) can be trapped.
#[cfg_attr(unix, allow(dead_code))]
fn ensure_interrupt_only(signals: &[Signal]) -> Result<(), Report> {
    match signals.iter().find(|s| **s != Signal::Interrupt) {
        Some(unsupported) => Err(eyre!(
            "{} is not supported on this platform",
            unsupported.constant()
        )),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
impl SignalSource for OsSignals {
    fn listen(&self, signals: &[Signal]) -> Result<SignalStream, Report> {
        ensure_interrupt_only(signals)?;
        if signals.is_empty() {
            return Ok(stream::pending::<Signal>().boxed());
        }

        #[cfg(windows)]
        {
            let listener = tokio::signal::windows::ctrl_c()
                .map_err(|err| eyre!("failed to install Ctrl-C handler: {err}"))?;
            let received = stream::unfold(listener, |mut listener| async move {
                listener.recv().await.map(|()| (Signal::Interrupt, listener))
            });

            Ok(received.boxed())
        }

        #[cfg(not(windows))]
        {
            Err(eyre!("process signals are not supported on this platform"))
        }
    }
}

const MANUAL_CAPACITY: usize = 16;

/// In-process signal source: signals are raised by calling
/// [raise](ManualSignals::raise) instead of being sent by the OS.
#[derive(Debug, Clone)]
pub struct ManualSignals {
    sender: broadcast::Sender<Signal>,
}

impl ManualSignals {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MANUAL_CAPACITY);
        Self { sender }
    }

    /// Deliver `signal` to every current listener, returning how many
    /// listeners were reached.
    pub fn raise(&self, signal: Signal) -> usize {
        tracing::debug!("raising {} manually", signal.constant());
        self.sender.send(signal).unwrap_or(0)
    }
}

impl Default for ManualSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for ManualSignals {
    fn listen(&self, signals: &[Signal]) -> Result<SignalStream, Report> {
        let wanted = signals.to_vec();
        let receiver = self.sender.subscribe();

        let received = stream::unfold(receiver, move |mut receiver| {
            let wanted = wanted.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(signal) if wanted.contains(&signal) => return Some((signal, receiver)),
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("signal listener lagged, skipped {skipped} signals");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(received.boxed())
    }
}
