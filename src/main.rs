// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! reqload - define modules once, run them when first required
//!
//! This is the command-line host for the reqload engine.
//!
//! ## Features
//!
//! - Resolve module references the way a running module would
//! - Load TOML module manifests and require modules from them
//! - Interactive REPL with completion over defined module paths

mod manifest;
mod render;
mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manifest::Manifest;
use owo_colors::OwoColorize;
use reqload_core::{EngineConfig, Registry, VERSION};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "reqload",
    about = "Lazy, memoizing module registry",
    version = VERSION
)]
struct Cli {
    /// Engine config file (defaults to ./reqload.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical path a reference resolves to
    Resolve {
        /// Module reference, e.g. ../data/core
        reference: String,

        /// Path of the requiring module; empty means top level
        #[arg(short, long, default_value = "")]
        base: String,
    },

    /// Define the modules in a manifest, then require and print the named ones
    Run {
        /// TOML module manifest
        manifest: PathBuf,

        /// Modules to require, in order
        #[arg(required = true)]
        modules: Vec<String>,
    },

    /// Start the interactive REPL, optionally preloading a manifest
    Repl {
        /// TOML module manifest
        manifest: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging; RUST_LOG takes precedence over --verbose
fn init_logging(verbose: bool) {
    let default = if verbose {
        "reqload=debug,reqload_core=debug"
    } else {
        "reqload=warn,reqload_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Some(Command::Resolve { reference, base }) => {
            println!("{}", reqload_core::resolve(&reference, &base));
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Run { manifest, modules }) => {
            let registry = registry(cli.config.as_deref(), Some(&manifest))?;
            run_modules(&registry, &modules)
        }
        Some(Command::Repl { manifest }) => {
            let registry = registry(cli.config.as_deref(), manifest.as_deref())?;
            run_repl(registry)
        }
        None => run_repl(registry(cli.config.as_deref(), None)?),
    }
}

/// Build a registry from config, preloading a manifest if given
fn registry(config: Option<&Path>, manifest: Option<&Path>) -> Result<Registry> {
    let config = load_config(config)?;
    tracing::debug!("Engine config: {:?}", config);
    let registry = Registry::with_config(config);

    if let Some(path) = manifest {
        let defined = Manifest::from_file(path)?.install(&registry);
        tracing::debug!("Defined {} modules from {}", defined, path.display());
    }
    Ok(registry)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let mut config = EngineConfig::from_file(path)?;
            config.load_from_env()?;
            Ok(config)
        }
        None => Ok(EngineConfig::load()?),
    }
}

/// Require each module in order and print its exports
fn run_modules(registry: &Registry, modules: &[String]) -> Result<ExitCode> {
    for module in modules {
        let exports = registry
            .require(module)
            .with_context(|| format!("while requiring '{}'", module))?;
        println!("{} {}", module.bright_cyan().bold(), render::format_exports(&exports));
    }
    Ok(ExitCode::SUCCESS)
}

/// Start the interactive REPL
fn run_repl(registry: Registry) -> Result<ExitCode> {
    let mut repl = repl::Repl::new(registry).context("failed to initialize REPL")?;
    repl.run().context("REPL error")?;
    Ok(ExitCode::SUCCESS)
}
