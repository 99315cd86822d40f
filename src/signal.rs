//! Identifiers for the OS signals a [Trap](crate::trap::Trap) can listen for.

use std::{fmt, str::FromStr};

use color_eyre::{eyre::eyre, Report};

/// An OS signal that can be trapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT`, usually sent by Ctrl-C.
    Interrupt,
    /// `SIGTERM`, the default signal sent by `kill` and service managers.
    Terminate,
    /// `SIGHUP`
    Hangup,
    /// `SIGQUIT`
    Quit,
    /// `SIGUSR1`
    User1,
    /// `SIGUSR2`
    User2,
    /// `SIGALRM`
    Alarm,
    /// `SIGCHLD`
    Child,
    /// `SIGPIPE`
    Pipe,
    /// `SIGWINCH`
    WindowChange,
}

impl Signal {
    /// Every supported signal.
    pub const ALL: [Signal; 10] = [
        Signal::Interrupt,
        Signal::Terminate,
        Signal::Hangup,
        Signal::Quit,
        Signal::User1,
        Signal::User2,
        Signal::Alarm,
        Signal::Child,
        Signal::Pipe,
        Signal::WindowChange,
    ];

    /// Human-readable description, as printed by `strsignal(3)`.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Interrupt => "interrupt",
            Signal::Terminate => "terminated",
            Signal::Hangup => "hangup",
            Signal::Quit => "quit",
            Signal::User1 => "user defined signal 1",
            Signal::User2 => "user defined signal 2",
            Signal::Alarm => "alarm clock",
            Signal::Child => "child exited",
            Signal::Pipe => "broken pipe",
            Signal::WindowChange => "window changed",
        }
    }

    /// Conventional `SIG*` constant name.
    pub fn constant(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
            Signal::Alarm => "SIGALRM",
            Signal::Child => "SIGCHLD",
            Signal::Pipe => "SIGPIPE",
            Signal::WindowChange => "SIGWINCH",
        }
    }

    /// The matching tokio signal kind.
    #[cfg(unix)]
    pub fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::Quit => SignalKind::quit(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
            Signal::Alarm => SignalKind::alarm(),
            Signal::Child => SignalKind::child(),
            Signal::Pipe => SignalKind::pipe(),
            Signal::WindowChange => SignalKind::window_change(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = Report;

    /// Accepts `SIGINT`, `INT` or `int` style names.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let upper = source.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(&upper);

        Signal::ALL
            .into_iter()
            .find(|signal| &signal.constant()[3..] == short)
            .ok_or_else(|| eyre!("unknown signal: {source}"))
    }
}
