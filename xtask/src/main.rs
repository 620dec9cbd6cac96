//! Build automation tasks for the rowbind workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for rowbind")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, docs)
    Ci,
    /// Run cargo fmt --check
    Fmt,
    /// Run clippy on every target
    Clippy,
    /// Run tests, optionally for a single crate
    Test {
        /// Package to test, e.g. `rowbind-client`
        #[arg(short, long)]
        package: Option<String>,
        /// Log filter for the in-memory driver suites
        #[arg(long)]
        log: Option<String>,
    },
    /// Check the crates without optional type support
    Minimal,
    /// Generate documentation
    Doc,
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh, None, None)?;
            minimal(&sh)?;
            doc(&sh)?;
            println!("All CI checks passed!");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package, log } => test(&sh, package.as_deref(), log.as_deref())?,
        Command::Minimal => minimal(&sh)?,
        Command::Doc => doc(&sh)?,
        Command::Clean => clean(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)
        .context("invalid UTF-8 in cargo output")?
        .trim()
        .to_string();

    Ok(PathBuf::from(path)
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("Checking formatting...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    println!("Formatting check passed.");
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("Running clippy...");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("Clippy check passed.");
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, log: Option<&str>) -> Result<()> {
    let _env = log.map(|filter| sh.push_env("RUST_LOG", filter));
    match package {
        Some(package) => {
            println!("Running tests for {package}...");
            cmd!(sh, "cargo test -p {package}").run()?;
        }
        None => {
            println!("Running tests...");
            cmd!(sh, "cargo test --workspace").run()?;
        }
    }
    println!("All tests passed.");
    Ok(())
}

fn minimal(sh: &Shell) -> Result<()> {
    println!("Checking rowbind-types without default features...");
    cmd!(sh, "cargo check -p rowbind-types --no-default-features").run()?;
    println!("Minimal check passed.");
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("Generating documentation...");
    cmd!(sh, "cargo doc --workspace --no-deps").run()?;
    println!("Documentation generated.");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("Clean complete.");
    Ok(())
}
