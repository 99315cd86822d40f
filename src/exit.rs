//! Ordered shutdown steps whose failures are folded into a single exit code.
//!
//! Step `n` (1-based) owns bit `n - 1` of the [ExitCode]: if the second and
//! third of four steps fail the code is `2 + 4 = 6`, and the caller can tell
//! which steps failed from the code alone.
//!
//! ```no_run
//! # async fn run() -> Result<(), color_eyre::Report> {
//! use color_eyre::eyre::eyre;
//! use grip::{exit::{exit_channel, Exit}, handler::message, signal::Signal, trap::trap};
//!
//! let (tx, rx) = exit_channel();
//! trap(
//!     message(
//!         "received shutdown request",
//!         std::io::stdout(),
//!         Exit::new(tx, std::io::stderr())
//!             .step(|| Ok(()))
//!             .step(|| Err(eyre!("since this is the second step it'll add 2"))),
//!     ),
//!     &[Signal::Interrupt, Signal::Terminate],
//! )?;
//! rx.recv().await?.exit();
//! # }
//! ```

use core::time::Duration;
use std::{fmt, io::Write};

use color_eyre::{eyre::eyre, Report};
use tokio::sync::oneshot;

use crate::{handler::SignalHandler, signal::Signal, utils::write_line};

/// Number of bits of an exit status that survive on most platforms.
pub const EXIT_STATUS_BITS: usize = 8;

/// Process exit code where bit `i` is set if step `i` (0-based) failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExitCode(u32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Whether the step at `index` (0-based) failed.
    pub fn failed(&self, index: usize) -> bool {
        index < u32::BITS as usize && self.0 & (1 << index) != 0
    }

    /// 0-based indices of every failed step, in ascending order.
    pub fn failed_steps(&self) -> impl Iterator<Item = usize> + '_ {
        (0..u32::BITS as usize).filter(move |index| self.failed(*index))
    }

    /// Terminate the process using this code as its exit status.
    pub fn exit(self) -> ! {
        std::process::exit(self.into())
    }
}

impl From<u32> for ExitCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Codes above `i32::MAX` (step 32 failed) saturate. Most platforms keep only
/// the low 8 bits of the status anyway.
impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        i32::try_from(code.0).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of cleanup work run while shutting down.
pub trait ShutdownStep: Send {
    fn run(&mut self) -> Result<(), Report>;
}

impl<F> ShutdownStep for F
where
    F: FnMut() -> Result<(), Report> + Send,
{
    fn run(&mut self) -> Result<(), Report> {
        self()
    }
}

/// Sending half of the exit code handoff, consumed by an [Exit].
#[derive(Debug)]
pub struct ExitSender(oneshot::Sender<ExitCode>);

/// Receiving half of the exit code handoff, held by the waiting caller.
#[derive(Debug)]
pub struct ExitReceiver(oneshot::Receiver<ExitCode>);

/// Create the single-use channel an [Exit] delivers its code through.
///
/// Delivery never blocks the signal handler: the code waits in the channel
/// until the receiver picks it up.
pub fn exit_channel() -> (ExitSender, ExitReceiver) {
    let (tx, rx) = oneshot::channel();
    (ExitSender(tx), ExitReceiver(rx))
}

fn undelivered() -> Report {
    eyre!("exit handler was dropped before delivering an exit code")
}

impl ExitReceiver {
    /// Wait for the exit code.
    ///
    /// Fails if the [Exit] holding the sender is dropped without running, for
    /// example when its trap was disarmed.
    pub async fn recv(self) -> Result<ExitCode, Report> {
        self.0.await.map_err(|_| undelivered())
    }

    /// Like [recv](ExitReceiver::recv), giving up after `timeout`.
    pub async fn recv_timeout(self, timeout: Duration) -> Result<ExitCode, Report> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| eyre!("no exit code received within {timeout:?}"))?
    }

    /// Block the current thread until the exit code arrives.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(self) -> Result<ExitCode, Report> {
        self.0.blocking_recv().map_err(|_| undelivered())
    }
}

/// Signal handler that runs shutdown steps in order and sends the resulting
/// [ExitCode] to an [ExitReceiver].
///
/// Every step runs even when an earlier one fails. Each failure adds the
/// step's bit to the code and writes
/// `"added <weight> to exit code for error: <error>"` to the error sink.
pub struct Exit<W> {
    sender: Option<ExitSender>,
    sink: W,
    steps: Vec<Box<dyn ShutdownStep>>,
}

impl<W: Write + Send> Exit<W> {
    pub fn new(sender: ExitSender, sink: W) -> Self {
        Self {
            sender: Some(sender),
            sink,
            steps: Vec::new(),
        }
    }

    /// Append a closure as the next shutdown step.
    pub fn step<F>(self, step: F) -> Self
    where
        F: FnMut() -> Result<(), Report> + Send + 'static,
    {
        self.push(step)
    }

    /// Append the next shutdown step.
    pub fn push<S>(mut self, step: S) -> Self
    where
        S: ShutdownStep + 'static,
    {
        self.steps.push(Box::new(step));
        if self.steps.len() == EXIT_STATUS_BITS + 1 {
            tracing::warn!(
                "more than {EXIT_STATUS_BITS} shutdown steps, failures past step {EXIT_STATUS_BITS} may be lost from the process exit status"
            );
        }
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order and return the accumulated exit code.
    pub fn run_steps(&mut self) -> ExitCode {
        let mut code = 0;
        // `None` once the weight no longer fits in the code.
        let mut weight = Some(1u32);

        for (index, step) in self.steps.iter_mut().enumerate() {
            if let Err(err) = step.run() {
                let number = index + 1;
                let line = match weight {
                    Some(weight) => {
                        code += weight;
                        tracing::warn!(step = number, weight, "shutdown step failed: {err}");
                        format!("added {weight} to exit code for error: {err}\n")
                    }
                    None => {
                        tracing::error!(step = number, "shutdown step failed outside the exit code: {err}");
                        format!("step {number} failed but has no exit code bit: {err}\n")
                    }
                };
                write_line(&mut self.sink, &line);
            }
            weight = weight.and_then(|weight| weight.checked_mul(2));
        }

        ExitCode(code)
    }
}

impl<W: Write + Send> SignalHandler for Exit<W> {
    fn handle(&mut self, signal: Signal) {
        tracing::info!("running {} shutdown steps after {signal}", self.steps.len());
        let code = self.run_steps();

        match self.sender.take() {
            Some(ExitSender(tx)) => {
                tracing::debug!("delivering exit code {code}");
                if tx.send(code).is_err() {
                    tracing::warn!("exit code {code} was not delivered, receiver is gone");
                }
            }
            None => tracing::warn!("exit code {code} dropped, one was already delivered"),
        }
    }
}
