//! `clap`-derived CLI surface over the [`crate::validator`] facade. The
//! binary entry point (`src/bin/fhir_validate.rs`) owns process setup
//! (logging subscriber, exit codes); this module owns argument parsing and
//! command dispatch so it stays testable without spawning a process.

use crate::core::ValidatorConfig;
use crate::error::Result;
use crate::loader::PackageLoader;
use crate::validator::{new_validator, ValidationOptions, Validator};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fhir-validate")]
#[command(about = "Compiles FHIR StructureDefinitions, ValueSets, and CodeSystems into an executable schema and validates documents against it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity; repeat for more detail (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Package (and, with the `disk-cache` feature, compiled-schema) cache
    /// directory. Defaults to `FHIR_CACHE_DIR`, then `~/.fhir/packages`.
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register local files/directories and report a compile summary.
    Load {
        /// Files or directories of FHIR JSON resources to register.
        paths: Vec<PathBuf>,
    },
    /// Validate a document (inline JSON, a path, or `-` for stdin) against one or more profiles.
    Validate {
        document: String,
        /// Canonical URL to validate against; may be repeated.
        #[arg(long = "profile")]
        profiles: Vec<String>,
        /// Package id (`name` or `name!version`) to load before validating.
        #[arg(long = "package")]
        packages: Vec<String>,
        /// Local file or directory to load before validating.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        #[arg(long)]
        ignore_unknown_schemas: bool,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Report whether a canonical URL is recognized and summarize its compiled shape.
    Inspect {
        url: String,
        #[arg(long = "package")]
        packages: Vec<String>,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

/// Translates `-v`/`-q` into an `EnvFilter` directive, letting `RUST_LOG`
/// still take precedence when set (see the binary entry point).
pub fn verbosity_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub async fn run(command: Command, cache_dir: Option<String>) -> Result<bool> {
    match command {
        Command::Load { paths } => load_command(paths, cache_dir).await,
        Command::Validate { document, profiles, packages, files, ignore_unknown_schemas, format } => {
            validate_command(document, profiles, packages, files, ignore_unknown_schemas, &format, cache_dir).await
        }
        Command::Inspect { url, packages, files } => inspect_command(url, packages, files, cache_dir).await,
    }
}

async fn build_validator(packages: Vec<String>, files: Vec<PathBuf>, cache_dir: Option<String>) -> Result<Validator> {
    let mut validator = if packages.is_empty() {
        new_validator(None)
    } else {
        new_validator(Some(Box::new(PackageLoader::with_cache_dir(cache_dir.as_deref()).await?)))
    };
    if let Some(dir) = cache_dir {
        validator = validator.with_config(ValidatorConfig::default().with_cache_dir(dir));
    }
    if !files.is_empty() {
        validator.load_files(&files).await?;
    }
    if !packages.is_empty() {
        validator.load_packages(&packages).await?;
    }
    Ok(validator)
}

async fn load_command(paths: Vec<PathBuf>, cache_dir: Option<String>) -> Result<bool> {
    let mut validator = match cache_dir {
        Some(dir) => new_validator(None).with_config(ValidatorConfig::default().with_cache_dir(dir)),
        None => new_validator(None),
    };
    validator.load_files(&paths).await?;
    println!("Loaded {} path(s)", paths.len());
    Ok(true)
}

async fn validate_command(
    document: String,
    profiles: Vec<String>,
    packages: Vec<String>,
    files: Vec<PathBuf>,
    ignore_unknown_schemas: bool,
    format: &str,
    cache_dir: Option<String>,
) -> Result<bool> {
    let validator = build_validator(packages, files, cache_dir).await?;
    let outcome = validator
        .validate(resolve_input(document)?, ValidationOptions { profiles, ignore_unknown_schemas, ..Default::default() })
        .await?;

    if format == "json" {
        let body = serde_json::json!({"success": outcome.success, "errors": outcome.errors});
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if outcome.success {
        println!("Validation passed");
    } else {
        println!("Validation failed with {} issue(s):", outcome.errors.len());
        for error in &outcome.errors {
            println!("  - {error}");
        }
    }
    Ok(outcome.success)
}

async fn inspect_command(url: String, packages: Vec<String>, files: Vec<PathBuf>, cache_dir: Option<String>) -> Result<bool> {
    let validator = build_validator(packages, files, cache_dir).await?;
    if !validator.recognizes(&url) {
        println!("{url}: not recognized");
        return Ok(false);
    }
    match validator.describe(&url) {
        Some(shape) => println!("{url}: recognized — {shape}"),
        None => println!("{url}: recognized"),
    }
    Ok(true)
}

fn resolve_input(document: String) -> Result<String> {
    if document == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_escalates_with_repeated_flag() {
        assert_eq!(verbosity_directive(0, false), "info");
        assert_eq!(verbosity_directive(2, false), "trace");
        assert_eq!(verbosity_directive(2, true), "error");
    }
}
