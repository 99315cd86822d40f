use color_eyre::Report;

use grip::{
    cli::Options,
    exit::{exit_channel, Exit},
    handler::message,
    telemetry::attach_tracing_logger,
    trap::trap,
};

#[tokio::main]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;
    attach_tracing_logger()?;

    let options = Options::parse_from_args(std::env::args())?;

    // The trap delivers the encoded exit code through this channel.
    let (tx, rx) = exit_channel();
    let exit = options.add_steps(Exit::new(tx, std::io::stderr()));
    let subscription = trap(
        message(options.label.clone(), std::io::stdout(), exit),
        &options.signals,
    )?;
    tracing::info!(
        "pid {} waiting for {:?}",
        std::process::id(),
        subscription.signals()
    );

    let code = rx.recv().await?;
    tracing::info!("exiting with code {code}");
    code.exit()
}
