pub mod adapters;
pub mod core;
pub mod runtime;

use std::process::ExitCode;

use clap::Parser;

pub fn run() -> ExitCode {
    env_logger::init();
    let cli = runtime::cli::Cli::parse();

    let tokio_runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(error) => {
            eprintln!("failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match tokio_runtime.block_on(cli.run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
