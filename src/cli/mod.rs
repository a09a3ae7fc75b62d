// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface: argument parsing, console logging and the
//! `openpose-tracker` run.

/// CLI arguments.
pub mod args;

/// Console logging macros and verbosity switch.
pub mod logging;

/// Tracking run.
pub mod run;
