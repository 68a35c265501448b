use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use lrrscan::cli::{LaunchArgs, SessionCommand, SessionsArgs};
use lrrscan::errors::*;
use lrrscan::session::*;
use lrrscan::PatternTable;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = SessionsArgs::parse();
    let mut tmux = TmuxSessions::default();

    match run(&mut tmux, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(manager: &mut dyn SessionManager, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Launch(args) => launch_all(manager, &args),
        SessionCommand::List => {
            for name in manager.list()? {
                println!("{name}");
            }
            Ok(())
        }
        SessionCommand::Attach { name } => manager.attach(&name),
        SessionCommand::Kill { name } => manager.kill(&name),
    }
}

fn launch_all(manager: &mut dyn SessionManager, args: &LaunchArgs) -> Result<()> {
    let patterns = PatternTable::builtin().select(&args.patterns)?;
    let plan = plan_launch(args, &patterns);
    let started = launch(manager, &plan)?;

    println!("Started {} sessions:", started.len());
    for name in &started {
        println!("  {name}");
    }
    println!(
        "Attach with `lrr-sessions attach <name>`, detach with Ctrl+B then D, list with `lrr-sessions list`."
    );
    Ok(())
}
