use std::io;

use clap::Parser;
use dbn_cli::{is_broken_pipe, live, replay, Args, Command};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    let res = match &args.command {
        Command::Live(live_args) => live(live_args),
        Command::Replay(replay_args) => replay(replay_args),
    };
    match res {
        // Handle broken pipe as a non-error.
        Err(e) if is_broken_pipe(&e) => Ok(()),
        res => res,
    }
}
