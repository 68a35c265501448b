use std::error::Error as _;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use lrrscan::cli::ScanArgs;
use lrrscan::errors::*;
use lrrscan::*;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(&ScanArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  {} {s}", "caused by:".yellow());
                source = s.source();
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &ScanArgs) -> Result<()> {
    if args.list_patterns {
        print!("{}", pattern_table(args)?.to_yaml()?);
        return Ok(());
    }

    if args.folder {
        let mut configs = folder_configs(args)?;
        let storage = resolve_storage(&mut configs)?;
        run_batch(&configs, storage.as_ref()).into_result()?;
        return Ok(());
    }

    let mut config = RunConfig::from_args(args)?;
    let storage = resolve_storage(std::slice::from_mut(&mut config))?;
    Job::new(&config).run(storage.as_ref())?;
    Ok(())
}
