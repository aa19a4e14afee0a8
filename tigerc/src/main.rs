//! `tigerc`: command-line driver for the Tiger-to-x86-64 compiler.
//!
//! A thin `clap`-derived wrapper around `tiger_codegen::driver`, matching
//! the CLI surface `wasmtime-cli` presents for its own backend: one
//! positional argument, `env_logger` wired to `RUST_LOG`, and top-level
//! error reporting via `anyhow`.

mod frontend;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;

use tiger_codegen::frame::all_registers;
use tiger_codegen::temp::{TempFactory, TempMap};
use tiger_codegen::translate::{Fragment, FragmentManager, Translator};

/// Compile a Tiger source file to x86-64 System V assembly.
#[derive(ClapParser)]
#[command(name = "tigerc")]
struct Cli {
    /// Path to the Tiger source file.
    source: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli.source) {
        Ok(output_path) => {
            println!("wrote {}", output_path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Compiles `path` and writes the resulting assembly next to it with a
/// `.s` extension, per §6's "single `.s` file" output contract.
fn run(path: &str) -> Result<PathBuf> {
    let source = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let ast = frontend::parse_source(&source)?;

    let mut factory = TempFactory::new();
    let map = TempMap::initialize(&mut factory, &all_registers());
    let translator = Translator::new(factory, map);
    let fragments = translator.translate_program(&ast)?;

    let assembly = tiger_codegen::compile_all(into_fragment_vec(fragments));
    let output_path = Path::new(path).with_extension("s");
    fs::write(&output_path, assembly).with_context(|| format!("writing {}", output_path.display()))?;
    Ok(output_path)
}

fn into_fragment_vec(fragments: FragmentManager) -> Vec<Fragment> {
    fragments.into_fragments()
}
