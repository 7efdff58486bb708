//! kyra-cli — bibliothèque interne des binaires `kyrac` et `kyra`
//!
//! But : fournir une API **propre et testable** pour les deux CLI sans
//! mélanger la logique métier avec le parsing d'arguments (laissé à `src/bin/`).
//!
//! Points clés :
//! - `kyrac` : compile une source en module KBC, empaquette un dossier en
//!   archive KAR, désassemble un module
//! - `kyra`  : charge un `.kbc` ou un `.kar` (choisi par l'extension) et l'évalue
//! - Utilitaires d'E/S (stdin/stdout, écriture atomique, chemins par défaut)
//! - Traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

use kyra_core::{bytecode::Module, disasm, helpers, runtime, runtime::Value};
use kyra_kar::{Archive, MAIN_ENTRY};

// ───────────────────────────── Types publics ─────────────────────────────

/// Commande haut-niveau (sans parsing CLI — réservé aux binaires).
#[derive(Clone, Debug)]
pub enum Command {
    /// Compiler un fichier source vers un module KBC.
    Build(BuildTask),
    /// Empaqueter un dossier de sources dans une archive KAR.
    Pack(PackTask),
    /// Désassembler un module KBC.
    Disasm(DisasmTask),
    /// Charger puis évaluer un module `.kbc` ou une archive `.kar`.
    Run(RunTask),
}

#[derive(Clone, Debug, Default)]
pub struct BuildTask {
    pub input: Input,   // chemin ou stdin
    pub output: Output, // chemin, stdout ou auto (même nom, extension .kbc)
    pub time: bool,     // afficher le timing
}

#[derive(Clone, Debug, Default)]
pub struct PackTask {
    pub folder: PathBuf,         // dossier de sources
    pub output: Option<PathBuf>, // défaut : <dossier>.kar
}

#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    pub input: ModuleInput,
    pub output: Output, // fichier ou stdout
    pub check: bool,    // valider les flux d'instructions avant d'afficher
}

#[derive(Clone, Debug, Default)]
pub struct RunTask {
    pub program: PathBuf, // .kbc ou .kar (choisi par l'extension)
    pub time: bool,
}

/// Entrée texte (source) : fichier ou `-` (= stdin).
#[derive(Clone, Debug)]
pub enum Input {
    Path(PathBuf),
    Stdin,
}
impl Default for Input {
    fn default() -> Self {
        Self::Stdin
    }
}

/// Entrée binaire : module KBC encodé, sur disque ou déjà en mémoire.
#[derive(Clone, Debug)]
pub enum ModuleInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}
impl Default for ModuleInput {
    fn default() -> Self {
        Self::Bytes(Vec::new())
    }
}

/// Sortie générique.
#[derive(Clone, Debug)]
pub enum Output {
    Path(PathBuf),
    Stdout,
    Auto, // build : même nom que la source, extension .kbc
}
impl Default for Output {
    fn default() -> Self {
        Self::Stdout
    }
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .try_init();
    }
}

/// Mappe la verbosité CLI sur `RUST_LOG` (sans écraser une valeur existante),
/// puis initialise le logger.
pub fn init_telemetry(verbose: u8, quiet: bool) {
    #[cfg(feature = "trace")]
    {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        std::env::set_var(
            "RUST_LOG",
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()),
        );
        init_logger();
    }
    #[cfg(not(feature = "trace"))]
    {
        let _ = (verbose, quiet);
    }
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande. Retourne un code de sortie processus.
pub fn execute(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Build(t) => build_entry(t),
        Command::Pack(t) => pack_entry(t),
        Command::Disasm(t) => disasm_entry(t),
        Command::Run(t) => run_entry(t),
    }
}

fn build_entry(task: BuildTask) -> Result<i32> {
    let BuildTask { input, output, time } = task;

    let src = read_source(&input).context("lecture de la source")?;

    let start = Instant::now();
    let bytes = kyra_compiler::compile_to_bytes(&src).context("échec de compilation")?;
    let elapsed = start.elapsed();

    #[cfg(feature = "trace")]
    log::debug!("module compilé : {} octet(s)", bytes.len());

    let out_path = match (&output, &input) {
        (Output::Auto, Input::Path(p)) => default_module_path(p),
        (Output::Auto, Input::Stdin) => PathBuf::from("out.kbc"),
        (Output::Path(p), _) => p.clone(),
        (Output::Stdout, _) => PathBuf::new(), // indicateur stdout
    };

    if let Output::Stdout = output {
        let mut w = BufWriter::new(io::stdout().lock());
        w.write_all(&bytes)?;
        w.flush()?;
    } else {
        write_bytes_atomic(&out_path, &bytes)
            .with_context(|| format!("écriture de {}", display(&out_path)))?;
        status_ok("BUILD", &display(&out_path));
    }

    if time {
        status_info("TIME", &format!("build: {} ms", elapsed.as_millis()));
    }
    Ok(0)
}

fn pack_entry(task: PackTask) -> Result<i32> {
    let PackTask { folder, output } = task;

    let archive = Archive::pack_dir(&folder)
        .with_context(|| format!("empaquetage de {}", display(&folder)))?;

    #[cfg(feature = "trace")]
    log::debug!("archive : {} entrée(s)", archive.files.len());

    let out_path = output.unwrap_or_else(|| default_archive_path(&folder));
    let bytes = archive.encode().context("encodage de l'archive")?;
    write_bytes_atomic(&out_path, &bytes)
        .with_context(|| format!("écriture de {}", display(&out_path)))?;

    status_ok("PACK", &display(&out_path));
    Ok(0)
}

fn disasm_entry(task: DisasmTask) -> Result<i32> {
    let DisasmTask { input, output, check } = task;

    let (bytes, title) = read_module_bytes(&input)?;
    let module = Module::from_bytes(&bytes).context("décodage du module")?;

    if check {
        helpers::validate_module(&module).context("module invalide")?;
    }

    let text = disasm::disassemble_module(&module, &title);
    match output {
        Output::Stdout => {
            let mut w = BufWriter::new(io::stdout().lock());
            w.write_all(text.as_bytes())?;
            w.flush()?;
        },
        Output::Path(ref p) => {
            write_text_atomic(p, &text)?;
            status_ok("DISASM", &display(p));
        },
        Output::Auto => anyhow::bail!("Output::Auto n'est pas valide pour disasm"),
    }
    Ok(0)
}

fn run_entry(task: RunTask) -> Result<i32> {
    let RunTask { program, time } = task;

    let bytes =
        fs::read(&program).with_context(|| format!("lecture de {}", display(&program)))?;

    let start = Instant::now();
    let result = match program.extension().and_then(|e| e.to_str()) {
        Some("kar") => run_archive_bytes(&bytes)?,
        _ => run_module_bytes(&bytes)?,
    };
    let elapsed = start.elapsed();

    if let Some(value) = result {
        println!("{value}");
    }
    if time {
        status_info("TIME", &format!("run: {} ms", elapsed.as_millis()));
    }
    Ok(0)
}

/// Décode puis évalue un module KBC ; rend la valeur optionnelle produite.
pub fn run_module_bytes(bytes: &[u8]) -> Result<Option<Value>> {
    let module = Module::from_bytes(bytes).context("décodage du module")?;

    #[cfg(feature = "trace")]
    log::debug!("module chargé : {} fonction(s)", module.functions.len());

    runtime::run_module(&module).context("évaluation du module")
}

/// Ouvre une archive KAR et évalue son entrée `main.kbc`.
pub fn run_archive_bytes(bytes: &[u8]) -> Result<Option<Value>> {
    let archive = Archive::from_bytes(bytes).context("décodage de l'archive")?;
    let main = archive
        .get(MAIN_ENTRY)
        .ok_or_else(|| anyhow!("l'archive n'a pas d'entrée `{MAIN_ENTRY}`"))?;
    run_module_bytes(main)
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_source(input: &Input) -> Result<String> {
    match input {
        Input::Stdin => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        },
        Input::Path(p) => {
            let f = File::open(p).with_context(|| format!("ouverture de {}", display(p)))?;
            let mut r = BufReader::new(f);
            let mut s = String::new();
            r.read_to_string(&mut s)?;
            Ok(s)
        },
    }
}

fn read_module_bytes(input: &ModuleInput) -> Result<(Vec<u8>, String)> {
    match input {
        ModuleInput::Bytes(b) => Ok((b.clone(), String::from("module"))),
        ModuleInput::Path(p) if p.as_os_str() == "-" => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok((buf, String::from("<stdin>")))
        },
        ModuleInput::Path(p) => {
            let bytes = fs::read(p).with_context(|| format!("lecture de {}", display(p)))?;
            Ok((bytes, display(p)))
        },
    }
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("chemin de sortie sans parent : {}", display(path)))?;
    let tmp = unique_tmp_path(parent, path.file_name().unwrap_or_default());
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(bytes)?;
        w.flush()?;
    }
    if path.exists() {
        // Windows : renommer sur une cible existante peut échouer
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path).or_else(|_| {
        fs::copy(&tmp, path).map(|_| ()).and_then(|_| fs::remove_file(&tmp).map(|_| ()))
    })?;
    Ok(())
}

fn write_text_atomic(path: &Path, text: &str) -> Result<()> {
    write_bytes_atomic(path, text.as_bytes())
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{}", base.to_string_lossy(), i));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn default_module_path(src: &Path) -> PathBuf {
    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let mut p = src.with_file_name(stem);
    p.set_extension("kbc");
    p
}

fn default_archive_path(dir: &Path) -> PathBuf {
    let name = dir.file_name().and_then(|s| s.to_str()).unwrap_or("out");
    dir.with_file_name(format!("{name}.kar"))
}

fn display(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        eprintln!("{} {}", tag.green().bold(), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{} {}", tag, msg);
    }
}

fn status_info(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        eprintln!("{} {}", tag.blue().bold(), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{} {}", tag, msg);
    }
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_paths() {
        let p = PathBuf::from("demos/hello.kyra");
        assert_eq!(default_module_path(&p), PathBuf::from("demos/hello.kbc"));
        assert_eq!(
            default_archive_path(Path::new("demos/hello")),
            PathBuf::from("demos/hello.kar")
        );
    }

    #[test]
    fn run_module_bytes_returns_the_module_result() {
        let bytes = kyra_compiler::compile_to_bytes("return 2 + 3").unwrap();
        assert_eq!(run_module_bytes(&bytes).unwrap(), Some(Value::I32(5)));
    }

    #[test]
    fn run_module_bytes_without_result() {
        let bytes = kyra_compiler::compile_to_bytes("let x = 1").unwrap();
        assert_eq!(run_module_bytes(&bytes).unwrap(), None);
    }

    #[test]
    fn run_archive_bytes_uses_the_main_entry() {
        let module = kyra_compiler::compile_to_bytes("return 7").unwrap();
        let mut archive = Archive::new();
        archive.add_file(MAIN_ENTRY, module);
        let bytes = archive.encode().unwrap();
        assert_eq!(run_archive_bytes(&bytes).unwrap(), Some(Value::I32(7)));
    }

    #[test]
    fn run_archive_bytes_without_main_entry() {
        let mut archive = Archive::new();
        archive.add_file("lib.kbc", vec![1, 2, 3]);
        let bytes = archive.encode().unwrap();
        let err = run_archive_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("main.kbc"));
    }

    #[test]
    fn build_then_run_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("prog.kyra");
        fs::write(&src_path, "let x = 4\nreturn x * x").unwrap();

        let code = build_entry(BuildTask {
            input: Input::Path(src_path),
            output: Output::Auto,
            time: false,
        })
        .unwrap();
        assert_eq!(code, 0);

        let bytes = fs::read(dir.path().join("prog.kbc")).unwrap();
        assert_eq!(run_module_bytes(&bytes).unwrap(), Some(Value::I32(16)));
    }

    #[test]
    fn disasm_entry_writes_the_listing() {
        let module = kyra_compiler::compile_to_bytes("exit").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("listing.txt");

        let code = disasm_entry(DisasmTask {
            input: ModuleInput::Bytes(module),
            output: Output::Path(out.clone()),
            check: true,
        })
        .unwrap();
        assert_eq!(code, 0);

        let text = fs::read_to_string(out).unwrap();
        assert!(text.contains("HALT"));
    }

    #[test]
    fn pack_entry_builds_a_kar_archive() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("app");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("main.kyra"), "return 1").unwrap();

        let code = pack_entry(PackTask { folder, output: None }).unwrap();
        assert_eq!(code, 0);

        let archive = Archive::load(dir.path().join("app.kar")).unwrap();
        let main = archive.get(MAIN_ENTRY).unwrap();
        assert_eq!(run_module_bytes(main).unwrap(), Some(Value::I32(1)));
    }
}
