//! `chtlc`: the CHTL compiler command line.
//!
//! Exit codes: 0 success, 1 diagnostics contain errors, 2 I/O failure,
//! 3 invalid invocation, 4 cancelled.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use chtl_compiler::cmod::{archive, CmodStructure, CompressionLevel};
use chtl_compiler::{CompilerConfig, CompilerDispatcher, DiagnosticCode};

const EXIT_DIAGNOSTICS: u8 = 1;
const EXIT_IO: u8 = 2;
const EXIT_USAGE: u8 = 3;
const EXIT_CANCELLED: u8 = 4;

#[derive(Parser)]
#[command(name = "chtlc", version = chtl_compiler::VERSION, about = "CHTL compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile one source file into HTML, CSS and JS.
    Compile {
        input: PathBuf,
        /// Output directory (defaults to the input's directory).
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        minify: bool,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        strict: bool,
        /// JSON config file with unit options.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Package a module directory into a CMOD archive.
    Pack {
        src_dir: PathBuf,
        out: PathBuf,
        /// none, fast, normal or best.
        #[arg(long, default_value = "normal")]
        level: String,
    },
    /// Unpack a CMOD archive into a directory.
    Unpack { input: PathBuf, out_dir: PathBuf },
    /// Dump a CMOD directory or archive structure and info.
    Analyze { path: PathBuf },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            let benign = matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            return if benign {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_USAGE)
            };
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(EXIT_IO)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Compile { input, out, minify, parallel, strict, config } => {
            compile(input, out, minify, parallel, strict, config)
        }
        Command::Pack { src_dir, out, level } => pack(src_dir, out, &level),
        Command::Unpack { input, out_dir } => {
            archive::unpack_archive(&input, &out_dir)
                .with_context(|| format!("unpacking {}", input.display()))?;
            info!("unpacked {} into {}", input.display(), out_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { path } => analyze(path),
    }
}

fn compile(
    input: PathBuf,
    out: Option<PathBuf>,
    minify: bool,
    parallel: bool,
    strict: bool,
    config_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<CompilerConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CompilerConfig::default(),
    };
    config.minify |= minify;
    config.parallel |= parallel;
    config.strict |= strict;

    let dispatcher = CompilerDispatcher::new(config.to_dispatcher_config());
    let result = dispatcher
        .compile_file(&input)
        .with_context(|| format!("reading {}", input.display()))?;

    for diagnostic in &result.diagnostics {
        eprintln!("{}", diagnostic);
    }

    let out_dir = out.unwrap_or_else(|| {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    fs::create_dir_all(&out_dir)?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    fs::write(out_dir.join(format!("{}.html", stem)), &result.html)?;
    if !result.css.is_empty() {
        fs::write(out_dir.join(format!("{}.css", stem)), &result.css)?;
    }
    if !result.js.is_empty() {
        fs::write(out_dir.join(format!("{}.js", stem)), &result.js)?;
    }

    if result
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::Cancelled)
    {
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    if !result.success {
        return Ok(ExitCode::from(EXIT_DIAGNOSTICS));
    }
    Ok(ExitCode::SUCCESS)
}

fn pack(src_dir: PathBuf, out: PathBuf, level: &str) -> Result<ExitCode> {
    let level = match level {
        "none" => CompressionLevel::None,
        "fast" => CompressionLevel::Fast,
        "best" => CompressionLevel::Best,
        _ => CompressionLevel::Normal,
    };

    let structure = CmodStructure::scan(&src_dir)
        .with_context(|| format!("scanning {}", src_dir.display()))?;
    let info = structure
        .validate()
        .with_context(|| format!("validating {}", src_dir.display()))?;
    if !info.accepts_host_version(chtl_compiler::VERSION) {
        eprintln!(
            "error[version-incompatible]: module `{}` requires compiler {}..{}, host is {}",
            info.name, info.min_version, info.max_version, chtl_compiler::VERSION
        );
        return Ok(ExitCode::from(EXIT_DIAGNOSTICS));
    }
    archive::pack_directory(&src_dir, &out, level)
        .with_context(|| format!("packing {}", src_dir.display()))?;
    info!("packed {} into {}", src_dir.display(), out.display());
    Ok(ExitCode::SUCCESS)
}

fn analyze(path: PathBuf) -> Result<ExitCode> {
    if path.is_file() {
        let entries =
            archive::list_entries(&path).with_context(|| format!("reading {}", path.display()))?;
        println!("archive {} ({} entries)", path.display(), entries.len());
        for entry in entries {
            println!(
                "  {}  {} -> {} bytes  crc32 {:08x}",
                entry.path, entry.uncompressed_size, entry.compressed_size, entry.crc32
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let structure =
        CmodStructure::scan(&path).with_context(|| format!("scanning {}", path.display()))?;
    println!("module {}", structure.module_name);
    match &structure.main_module_file {
        Some(main) => println!("  main: {}", main.display()),
        None => println!("  main: (none)"),
    }
    println!("  info: {}", structure.info_file.display());
    for submodule in &structure.submodules {
        println!(
            "  submodule {} (main: {})",
            submodule.name,
            submodule.main_file.is_some()
        );
    }
    for extra in &structure.additional_files {
        println!("  extra: {}", extra.display());
    }
    match structure.validate() {
        Ok(info) => {
            println!("  valid: yes");
            print!("{}", info.generate());
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            println!("  valid: no ({})", error);
            Ok(ExitCode::from(EXIT_DIAGNOSTICS))
        }
    }
}
