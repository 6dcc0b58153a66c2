//! certbot-updater binary entry point.
//!
//! Parses arguments, runs the command on a current-thread runtime and turns
//! any error into a readable message with exit code 1.

use anyhow::Result;
use certbot_updater::cli;
use certbot_updater::core::user_friendly_error;
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
