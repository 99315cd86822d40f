//! Callbacks invoked when a trapped signal arrives.
//!
//! Handlers are composed as an ordered [Chain] rather than by nesting
//! closures: a [Message] followed by an [Exit](crate::exit::Exit) behaves the
//! same as a message wrapping the exit handler.

use std::io::Write;

use crate::{signal::Signal, utils::write_line};

/// Something that reacts to a received [Signal].
pub trait SignalHandler: Send {
    fn handle(&mut self, signal: Signal);
}

impl<F> SignalHandler for F
where
    F: FnMut(Signal) + Send,
{
    fn handle(&mut self, signal: Signal) {
        self(signal)
    }
}

/// Handlers invoked one after another, in insertion order, with the same
/// signal.
#[derive(Default)]
pub struct Chain {
    handlers: Vec<Box<dyn SignalHandler>>,
}

impl Chain {
    /// Create an empty [Chain].
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the end of the chain.
    pub fn then<H>(mut self, handler: H) -> Self
    where
        H: SignalHandler + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl SignalHandler for Chain {
    fn handle(&mut self, signal: Signal) {
        for handler in self.handlers.iter_mut() {
            handler.handle(signal);
        }
    }
}

/// Writes `"<label>: <signal>\n"` to a sink each time it is invoked.
///
/// Writing is best-effort: a failed write is logged and otherwise ignored.
pub struct Message<W> {
    label: String,
    sink: W,
}

impl<W: Write + Send> Message<W> {
    pub fn new<S: Into<String>>(label: S, sink: W) -> Self {
        Self {
            label: label.into(),
            sink,
        }
    }
}

impl<W: Write + Send> SignalHandler for Message<W> {
    fn handle(&mut self, signal: Signal) {
        let line = format!("{}: {}\n", self.label, signal);
        write_line(&mut self.sink, &line);
    }
}

/// Build a handler that writes a [Message] line and then delegates to
/// `handler`.
///
/// ```no_run
/// # async fn run() -> Result<(), color_eyre::Report> {
/// use grip::{handler::message, signal::Signal, trap::trap};
///
/// trap(
///     message("received shutdown request", std::io::stdout(), |_: Signal| {
///         println!("our signal handler");
///     }),
///     &[Signal::Interrupt, Signal::Terminate],
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn message<S, W, H>(label: S, sink: W, handler: H) -> Chain
where
    S: Into<String>,
    W: Write + Send + 'static,
    H: SignalHandler + 'static,
{
    Chain::new().then(Message::new(label, sink)).then(handler)
}
