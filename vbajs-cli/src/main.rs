//! `vbajs`: a thin file-reading wrapper around `vbajs_compiler::convert`
//! (spec.md §6's "CLI (external collaborator)").

mod colors;

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Translate a VBA 6 source file to its best-effort scripting-language
/// equivalent.
#[derive(Parser, Debug)]
#[command(name = "vbajs", version, about)]
struct Cli {
    /// Path to the VBA source file to translate.
    input: PathBuf,

    /// Write the translated output here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{} reading {}: {e}",
                colors::red("error"),
                cli.input.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let translated = match vbajs_compiler::convert(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}: {}", colors::bold(&colors::red("error")), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, translated) {
                eprintln!("{} writing {}: {e}", colors::red("error"), path.display());
                return ExitCode::FAILURE;
            }
        }
        None => print!("{translated}"),
    }

    ExitCode::SUCCESS
}
