//! Command line interface for the Electron bundler.
//!
//! Reads the optional `packager.toml`, layers command line flags on top and
//! packages every requested target. Written bundle paths go to stdout, one
//! per line; progress and warnings go to stderr.

mod args;
pub mod config;

pub use args::Args;

use crate::bundler::{self, Collaborators, Options};
use crate::error::{CliError, Result};
use crate::output::OutputManager;
use std::path::PathBuf;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let options = resolve_options(&args).await?;
    let output = OutputManager::new(args.verbose, options.quiet);

    let bundles = bundler::package_with(options, Collaborators::default(), output.clone()).await?;
    report(&output, &bundles)?;
    Ok(0)
}

/// Builds options from the config file (if any) and the flags in `args`.
pub async fn resolve_options(args: &Args) -> Result<Options> {
    let is_dir = tokio::fs::metadata(&args.dir)
        .await
        .is_ok_and(|meta| meta.is_dir());
    if !is_dir {
        return Err(CliError::InvalidArguments {
            reason: format!("source directory {} does not exist", args.dir.display()),
        }
        .into());
    }

    let base = match config::load(args.config.as_deref(), &args.dir).await? {
        Some(loaded) => loaded.into_options(&args.dir)?,
        None => Options::new(&args.dir),
    };
    Ok(args.apply(base)?)
}

fn report(output: &OutputManager, bundles: &[PathBuf]) -> Result<()> {
    if bundles.is_empty() {
        output.warn("No bundles were written")?;
        return Ok(());
    }
    output.success(&format!("Wrote new app{} to:", if bundles.len() == 1 { "" } else { "s" }))?;
    for bundle in bundles {
        println!("{}", bundle.display());
    }
    Ok(())
}
