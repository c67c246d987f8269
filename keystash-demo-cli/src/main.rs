//! Keystash CLI
//!
//! Command-line front end for the keystash keychain facade.

use anyhow::Result;
use clap::Parser;
use keystash_demo_cli::cli::{BackendChoice, Cli, Commands};
use keystash_demo_cli::{commands, init_tracing, ui};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(&cli) {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.backend == BackendChoice::Memory {
        ui::warning("Using the in-memory backend; nothing outlives this process");
    }
    let store = cli.open_store()?;
    let prompt = cli.prompt();

    match &cli.command {
        Commands::Set { key, value, hex } => commands::entries::set(&store, key, value, *hex, prompt),
        Commands::Get { key, hex } => commands::entries::get(&store, key, *hex, prompt),
        Commands::Has { key } => commands::entries::has(&store, key).map(|_| ()),
        Commands::Delete { key } => commands::entries::delete(&store, key),
        Commands::Keys => commands::entries::keys(&store).map(|_| ()),
        Commands::Clear { yes } => commands::entries::clear(&store, *yes).map(|_| ()),
        Commands::Keygen {
            public_tag,
            private_tag,
            bits,
        } => commands::key_pairs::keygen(&store, public_tag, private_tag, *bits),
        Commands::KeyExport { tag } => commands::key_pairs::export(&store, tag).map(|_| ()),
        Commands::KeyDelete { tag } => commands::key_pairs::delete(&store, tag),
        Commands::KeyHas { tag } => commands::key_pairs::has(&store, tag).map(|_| ()),
    }
}
