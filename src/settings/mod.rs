//! Process configuration: a TOML file layered with `TURNSTILE__*`
//! environment overrides, read once at startup.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
