//! meshdir - control plane for a mesh routing network.
//!
//! a directory service mapping subdomain labels to live route leases,
//! with a private certificate authority issuing short-lived tls
//! certificates for the advertised endpoints.

use clap::Parser;
use color_eyre::eyre::Result;
use meshdir::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Cleanup(cmd) => cmd.run().await,
    }
}
