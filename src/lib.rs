//! Trap OS signals and turn an ordered list of shutdown steps into a single
//! exit code, one bit per failed step.
//!
//! A [Trap](trap::Trap) waits for the first of a set of signals and hands it
//! to a [SignalHandler](handler::SignalHandler). Handlers are chained in
//! order: typically a [Message](handler::Message) that announces the signal,
//! then an [Exit](exit::Exit) that runs the shutdown steps and delivers the
//! resulting [ExitCode](exit::ExitCode) to the waiting caller.

pub mod cli;
pub mod exit;
pub mod handler;
pub mod signal;
pub mod telemetry;
pub mod trap;
pub mod utils;

pub use exit::{exit_channel, Exit, ExitCode, ExitReceiver, ExitSender, ShutdownStep};
pub use handler::{message, Chain, Message, SignalHandler};
pub use signal::Signal;
pub use trap::{trap, Subscription, Trap};
