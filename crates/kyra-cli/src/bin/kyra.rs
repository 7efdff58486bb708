//! `kyra` — lanceur de modules KBC et d'archives KAR
//!
//! Charge le programme (`.kbc` ou `.kar`, choisi par l'extension), l'évalue,
//! puis affiche la valeur produite s'il y en a une.

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use kyra_cli as cli;

#[derive(Debug, Parser)]
#[command(name = "kyra", version, about = "Kyra runtime — exécuter un module KBC ou une archive KAR", long_about = None)]
struct Opt {
    /// Programme à exécuter (.kbc ou .kar)
    program: PathBuf,

    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,

    /// Afficher le temps d'exécution
    #[arg(long)]
    time: bool,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> Result<()> {
    let opt = Opt::parse();

    cli::init_telemetry(opt.verbose, opt.quiet);

    let task = cli::RunTask { program: opt.program, time: opt.time };
    let code = cli::execute(cli::Command::Run(task)).context("échec d'exécution du programme")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
