use std::io;

use anyhow::Result;
use rsmachine::cli::{self, Commands};
use rsmachine::iaas::registry;

fn main() -> Result<()> {
    let args = cli::parse_args()?;
    rsmachine::init_logging(args.command.log_level())?;

    let registry = registry::global();
    let mut stdout = io::stdout().lock();

    match &args.command {
        Commands::Create(opts) => {
            rsmachine::run_create(opts, registry, &mut stdout)?;
        }
        Commands::Delete(opts) => rsmachine::run_delete(opts, registry)?,
        Commands::Describe(opts) => rsmachine::run_describe(opts, registry, &mut stdout)?,
        Commands::Providers(_) => rsmachine::run_providers(registry, &mut stdout)?,
        Commands::Completions(opts) => rsmachine::run_completions(opts, &mut stdout)?,
    }

    Ok(())
}
