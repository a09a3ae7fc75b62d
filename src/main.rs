// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use openpose_tracker::cli::args::Cli;
use openpose_tracker::cli::run::run_tracking;

fn main() {
    let args = Cli::parse();

    if let Err(e) = run_tracking(&args) {
        openpose_tracker::error!("{e}");
        process::exit(1);
    }
}
