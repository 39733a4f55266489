use anyhow::Context;
use clap::Parser;
use diego_blame_config::{find_config_file, Config, FindConfigError};
use std::path::PathBuf;
use tracing::debug;

/// Name the pipeline is invoked under, passed ahead of the target host
pub const COMMAND_NAME: &str = "diego-blame";

pub fn parse_args() -> Args {
    Args::parse()
}

/// `diego-blame` - who is eating the memory on this Diego cell?
///
/// Lists every application instance running on HOST with its
/// org, space, disk, memory and CPU usage, the instances closest to their
/// memory quota first. Requests go through `cf curl`, so log in with the
/// cf CLI beforehand.
#[derive(Parser, Debug)]
#[command(version, about, long_about)]
pub struct Args {
    /// Make logging more verbose
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Make logging less verbose
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Path to config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// cf CLI executable, overrides the config file
    #[arg(long)]
    pub cf_binary: Option<PathBuf>,

    /// Cell address, exactly as the instances report it
    pub host: String,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            i16::MIN..=-2 => "off",
            -1 => "error",
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = if let Some(ref path) = self.config {
            Config::read(path)
                .with_context(|| format!("read config file '{}'", path.display()))?
        } else {
            match find_config_file() {
                Ok(path) => {
                    debug!(path = %path.display(), "using config file");
                    Config::read(&path)
                        .with_context(|| format!("read config file '{}'", path.display()))?
                }
                Err(FindConfigError::NotFound(_)) => Config::default(),
                Err(e) => return Err(e).context("search for a config file"),
            }
        };

        if let Some(ref cf_binary) = self.cf_binary {
            config.cf_binary = cf_binary.clone();
        }

        Ok(config)
    }

    /// Tokens handed to the pipeline entry point
    pub fn invocation(&self) -> Vec<String> {
        vec![COMMAND_NAME.to_owned(), self.host.clone()]
    }
}
