//! cli subcommands for meshdir.
//!
//! - `meshdir serve` - run the control plane server
//! - `meshdir cleanup` - run one inactive-domain cleanup pass

mod cleanup;
mod serve;

pub use cleanup::CleanupCommand;
pub use serve::ServeCommand;

use clap::{Parser, Subcommand};

/// meshdir - mesh routing control plane
#[derive(Parser, Debug)]
#[command(name = "meshdir")]
#[command(about = "Mesh routing control plane", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the control plane server
    Serve(ServeCommand),

    /// run one inactive-domain cleanup pass and exit
    Cleanup(CleanupCommand),
}
