//! Keystash demo CLI
//!
//! Command-line front end over `keystash-lib` for exercising the keychain
//! from a shell. The binary lives in `main.rs`; argument parsing and the
//! command implementations are exposed here so they can be tested.

pub mod cli;
pub mod commands;
pub mod ui;

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the defaults chosen by `verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "keystash_demo_cli=debug,keystash_lib=debug"
    } else {
        "keystash_demo_cli=info,keystash_lib=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
