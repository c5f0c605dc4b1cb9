// src/bin/hr.rs

use clap::Parser;
use hrun::cli::{Cli, app, handler::Handler};

#[tokio::main]
async fn main() {
    env_logger::init();

    let handler = Handler;
    if let Err(e) = app::run(Cli::parse(), &handler).await {
        log::debug!("Exiting with error: {:?}", e);
        handler.fail_with(e);
    }
}
