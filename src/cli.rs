//! Argument handling for the `grip` binary.
//!
//! ```text
//! grip [--label TEXT] [--steps N] [--fail K]... [SIGNAL]...
//! ```
//!
//! The binary traps the given signals (`SIGINT SIGTERM` by default), runs `N`
//! simulated shutdown steps when one arrives and exits with the encoded code.
//! Step `K` (1-based) fails for every `--fail K`.

use std::io::Write;

use color_eyre::{eyre::eyre, Report};
use tracing::info;

use crate::{exit::Exit, signal::Signal};

pub const DEFAULT_LABEL: &str = "received shutdown request";
pub const DEFAULT_STEPS: usize = 4;
pub const DEFAULT_SIGNALS: [Signal; 2] = [Signal::Interrupt, Signal::Terminate];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Prefix of the line written to stdout when a signal arrives.
    pub label: String,
    /// Number of simulated shutdown steps.
    pub steps: usize,
    /// 1-based steps that should fail.
    pub fail: Vec<usize>,
    /// Signals to trap.
    pub signals: Vec<Signal>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            steps: DEFAULT_STEPS,
            fail: Vec::new(),
            signals: DEFAULT_SIGNALS.to_vec(),
        }
    }
}

impl Options {
    /// Parse options from process arguments, the first of which is the
    /// program name.
    pub fn parse_from_args<A>(args: A) -> Result<Options, Report>
    where
        A: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut signals: Vec<Signal> = Vec::new();
        let mut args = args.into_iter().skip(1);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--label" => options.label = value_for(&arg, args.next())?,
                "--steps" => options.steps = number_for(&arg, args.next())?,
                "--fail" => options.fail.push(number_for(&arg, args.next())?),
                flag if flag.starts_with("--") => {
                    return Err(eyre!("invalid or unsupported option: {flag}"))
                }
                signal => signals.push(signal.parse::<Signal>()?),
            }
        }

        if !signals.is_empty() {
            options.signals = signals;
        }
        if let Some(step) = options
            .fail
            .iter()
            .find(|step| **step == 0 || **step > options.steps)
        {
            return Err(eyre!(
                "--fail {step} is out of range, steps are numbered 1 to {}",
                options.steps
            ));
        }

        Ok(options)
    }

    /// Append the simulated shutdown steps to `exit`.
    pub fn add_steps<W: Write + Send>(&self, mut exit: Exit<W>) -> Exit<W> {
        for number in 1..=self.steps {
            let fails = self.fail.contains(&number);
            exit = exit.step(move || {
                info!("running shutdown step {number}");
                if fails {
                    Err(eyre!("step {number} failed"))
                } else {
                    Ok(())
                }
            });
        }
        exit
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, Report> {
    value.ok_or_else(|| eyre!("missing value for {flag}"))
}

fn number_for(flag: &str, value: Option<String>) -> Result<usize, Report> {
    let value = value_for(flag, value)?;
    value
        .parse()
        .map_err(|err| eyre!("invalid value for {flag}: {value} ({err})"))
}
