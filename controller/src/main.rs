//! Shim binary for `brokerctl`.

use clap::Parser as _;

use brokerctl_controller::cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    brokerctl_controller::inner_main(Cli::parse()).await
}
