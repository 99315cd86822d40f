//! Run a handler once, when the first of a set of signals arrives.

use color_eyre::Report;
use futures::StreamExt;
use tokio::{sync::oneshot, task::JoinHandle};

use crate::{handler::SignalHandler, signal::Signal};

pub mod source;

pub use source::{ManualSignals, OsSignals, SignalSource, SignalStream};

/// Arms one-shot signal handlers against a [SignalSource].
#[derive(Debug, Clone, Default)]
pub struct Trap<S = OsSignals> {
    source: S,
}

impl Trap<OsSignals> {
    /// A [Trap] listening for real process signals.
    pub fn os() -> Self {
        Self { source: OsSignals }
    }
}

impl<S: SignalSource> Trap<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Listen for `signals` and invoke `handler` with the first one received.
    ///
    /// Returns as soon as the listener is registered; waiting happens on a
    /// spawned task, so this must be called from within a tokio runtime. The
    /// handler runs on the blocking pool and is never invoked a second time.
    /// An empty `signals` set produces a trap that never fires.
    pub fn arm<H>(&self, handler: H, signals: &[Signal]) -> Result<Subscription, Report>
    where
        H: SignalHandler + 'static,
    {
        let mut received = self.source.listen(signals)?;
        let (disarm, mut disarmed) = oneshot::channel::<()>();
        tracing::debug!("trap armed for {signals:?}");

        let task = tokio::spawn(async move {
            let signal = tokio::select! {
                biased;

                // A dropped `Subscription` closes the channel without a
                // value, which disables this branch instead of disarming.
                Ok(()) = &mut disarmed => {
                    tracing::debug!("trap disarmed before a signal arrived");
                    return None;
                }
                next = received.next() => match next {
                    Some(signal) => signal,
                    None => {
                        tracing::debug!("signal source closed before a signal arrived");
                        return None;
                    }
                },
            };
            // Stop listening before handing over to the handler.
            drop(received);
            tracing::info!("received {} ({signal})", signal.constant());

            let mut handler = handler;
            if let Err(err) = tokio::task::spawn_blocking(move || handler.handle(signal)).await {
                tracing::error!("signal handler for {signal} did not complete: {err}");
            }
            Some(signal)
        });

        Ok(Subscription {
            signals: signals.to_vec(),
            disarm: Some(disarm),
            task,
        })
    }
}

/// Listen for real process signals and invoke `handler` once.
///
/// Shorthand for [`Trap::os().arm(handler, signals)`](Trap::arm).
pub fn trap<H>(handler: H, signals: &[Signal]) -> Result<Subscription, Report>
where
    H: SignalHandler + 'static,
{
    Trap::os().arm(handler, signals)
}

/// Handle to an armed trap.
///
/// Dropping the subscription leaves the trap armed.
#[derive(Debug)]
pub struct Subscription {
    signals: Vec<Signal>,
    disarm: Option<oneshot::Sender<()>>,
    task: JoinHandle<Option<Signal>>,
}

impl Subscription {
    /// The signals this trap listens for.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Stop listening. Has no effect once a signal has been received; a
    /// handler that already started runs to completion.
    pub fn disarm(&mut self) {
        if let Some(disarm) = self.disarm.take() {
            _ = disarm.send(());
        }
    }

    /// Whether the trap has stopped listening and any handler has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the trap finishes, returning the signal that fired it, or
    /// `None` if it was disarmed or its source closed first.
    pub async fn wait(self) -> Option<Signal> {
        match self.task.await {
            Ok(signal) => signal,
            Err(err) => {
                tracing::error!("trap task failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use color_eyre::eyre::eyre;

    use super::*;
    use crate::{
        exit::{exit_channel, Exit},
        handler::message,
        utils::SharedBuffer,
    };

    fn counting() -> (Arc<AtomicUsize>, impl FnMut(Signal) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        (count, move |_: Signal| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn fires_once_and_does_not_rearm() {
        let trap = Trap::new(ManualSignals::new());
        let (count, handler) = counting();
        let subscription = trap
            .arm(handler, &[Signal::Interrupt, Signal::Terminate])
            .unwrap();

        assert_eq!(trap.source().raise(Signal::Terminate), 1);
        assert_eq!(subscription.wait().await, Some(Signal::Terminate));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Nobody is listening any more.
        assert_eq!(trap.source().raise(Signal::Terminate), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ignores_signals_outside_the_set() {
        let trap = Trap::new(ManualSignals::new());
        let received = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&received);
        let subscription = trap
            .arm(
                move |signal: Signal| record.lock().unwrap().push(signal),
                &[Signal::Interrupt],
            )
            .unwrap();
        assert_eq!(subscription.signals(), &[Signal::Interrupt]);

        trap.source().raise(Signal::Hangup);
        trap.source().raise(Signal::Interrupt);

        assert_eq!(subscription.wait().await, Some(Signal::Interrupt));
        assert_eq!(*received.lock().unwrap(), vec![Signal::Interrupt]);
    }

    #[tokio::test]
    async fn empty_signal_set_never_fires() {
        let trap = Trap::new(ManualSignals::new());
        let (tx, rx) = exit_channel();
        let subscription = trap.arm(Exit::new(tx, std::io::sink()), &[]).unwrap();

        for signal in Signal::ALL {
            trap.source().raise(signal);
        }

        assert!(rx.recv_timeout(Duration::from_millis(100)).await.is_err());
        assert!(!subscription.is_finished());
    }

    #[tokio::test]
    async fn disarmed_trap_does_not_fire() {
        let trap = Trap::new(ManualSignals::new());
        let (tx, rx) = exit_channel();
        let mut subscription = trap
            .arm(Exit::new(tx, std::io::sink()), &[Signal::Interrupt])
            .unwrap();

        subscription.disarm();
        trap.source().raise(Signal::Interrupt);

        assert_eq!(subscription.wait().await, None);
        // The handler, and with it the sender, is gone.
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn dropped_subscription_stays_armed() {
        let trap = Trap::new(ManualSignals::new());
        let (tx, rx) = exit_channel();
        let exit = Exit::new(tx, std::io::sink()).step(|| Err(eyre!("first")));
        drop(trap.arm(exit, &[Signal::Quit]).unwrap());

        tokio::task::yield_now().await;
        trap.source().raise(Signal::Quit);

        let code = rx.recv_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code.bits(), 1);
    }

    #[tokio::test]
    async fn signal_raised_right_after_arming_is_not_lost() {
        let trap = Trap::new(ManualSignals::new());
        let (count, handler) = counting();
        let subscription = trap.arm(handler, &[Signal::User1]).unwrap();

        // The spawned task has not been polled yet.
        assert_eq!(trap.source().raise(Signal::User1), 1);

        assert_eq!(subscription.wait().await, Some(Signal::User1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn message_then_exit_reports_failed_steps() {
        let trap = Trap::new(ManualSignals::new());
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let (tx, rx) = exit_channel();

        let handler = message(
            "received shutdown request",
            out.clone(),
            Exit::new(tx, err.clone())
                .step(|| Ok(()))
                .step(|| Err(eyre!("second")))
                .step(|| Err(eyre!("third")))
                .step(|| Ok(())),
        );
        trap.arm(handler, &[Signal::Interrupt, Signal::Terminate])
            .unwrap();

        trap.source().raise(Signal::Terminate);
        let code = rx.recv().await.unwrap();

        assert_eq!(code.bits(), 6);
        assert_eq!(out.lines(), vec!["received shutdown request: terminated"]);
        assert_eq!(
            err.lines(),
            vec![
                "added 2 to exit code for error: second",
                "added 4 to exit code for error: third",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn os_signal_fires_trap() {
        let (count, handler) = counting();
        let subscription = trap(handler, &[Signal::User2]).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-USR2", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let fired = tokio::time::timeout(Duration::from_secs(5), subscription.wait())
            .await
            .unwrap();
        assert_eq!(fired, Some(Signal::User2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
