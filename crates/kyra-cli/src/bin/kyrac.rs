//! `kyrac` — compilateur en ligne de commande de Kyra
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `kyra_cli` (lib).

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use kyra_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "kyrac", version, about = "Kyra CLI — compiler, empaqueter, désassembler KBC", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compiler une source Kyra vers un module KBC
    Build {
        /// Fichier source (ou - pour stdin)
        input: Option<PathBuf>,
        /// Fichier de sortie (défaut : même nom, extension .kbc ; - pour stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Afficher le temps de compilation
        #[arg(long)]
        time: bool,
    },

    /// Empaqueter un dossier de sources dans une archive KAR
    Pack {
        /// Dossier à empaqueter
        folder: PathBuf,
        /// Archive de sortie (défaut : <dossier>.kar)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Désassembler un module KBC
    Disasm {
        /// Module (.kbc) (ou - pour stdin)
        input: Option<PathBuf>,
        /// Sortie texte (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Valider les flux d'instructions avant d'afficher
        #[arg(long)]
        check: bool,
    },
}

// ──────────────────────────── Entrée / Sortie ────────────────────────────

fn input_from_opt(p: &Option<PathBuf>) -> cli::Input {
    match p {
        Some(path) if path.as_os_str() == "-" => cli::Input::Stdin,
        Some(path) => cli::Input::Path(path.clone()),
        None => cli::Input::Stdin,
    }
}

fn module_input_from_opt(p: &Option<PathBuf>) -> cli::ModuleInput {
    match p {
        Some(path) => cli::ModuleInput::Path(path.clone()),
        None => cli::ModuleInput::Path(PathBuf::from("-")),
    }
}

fn output_from_opt(output: &Option<PathBuf>, auto_default: bool) -> cli::Output {
    match output {
        Some(p) if p.as_os_str() == "-" => cli::Output::Stdout,
        Some(p) => cli::Output::Path(p.clone()),
        None if auto_default => cli::Output::Auto,
        None => cli::Output::Stdout,
    }
}

// ──────────────────────────── Couleur ────────────────────────────

fn init_color(choice: ColorChoice) {
    // `owo-colors` détecte le TTY tout seul ; on ne force que via env vars.
    match choice {
        ColorChoice::Auto => {},
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        },
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        },
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> Result<()> {
    let opt = Opt::parse();

    init_color(opt.color);
    cli::init_telemetry(opt.verbose, opt.quiet);

    let command = match opt.cmd {
        Command::Build { input, output, time } => cli::Command::Build(cli::BuildTask {
            input: input_from_opt(&input),
            output: output_from_opt(&output, /*auto_default=*/ true),
            time,
        }),
        Command::Pack { folder, output } => {
            cli::Command::Pack(cli::PackTask { folder, output })
        },
        Command::Disasm { input, output, check } => cli::Command::Disasm(cli::DisasmTask {
            input: module_input_from_opt(&input),
            output: output_from_opt(&output, /*auto_default=*/ false),
            check,
        }),
    };

    let code = cli::execute(command).context("échec d'exécution de la commande")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
