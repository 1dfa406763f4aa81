pub mod run;
pub mod status;
pub mod unlock;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use imgsync_core::{config, ConfigFile, Namespace, PublishConfig};

/// Configuration flags shared by every command.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Config file (default: $IM_CONFIG or ~/.imgsync/config.yaml).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Destination root (overrides $IM_DESTINATION).
    #[arg(long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Staging root (overrides $IM_VOLATILE).
    #[arg(long, value_name = "DIR")]
    pub volatile: Option<PathBuf>,

    /// Canonical root (overrides $IM_CANONICAL).
    #[arg(long, value_name = "DIR")]
    pub canonical: Option<PathBuf>,

    /// Directory holding run locks (overrides $IM_LOCK_ROOT).
    #[arg(long, value_name = "DIR")]
    pub lock_root: Option<PathBuf>,
}

impl ConfigArgs {
    /// Resolve file < environment < flags < `extra`.
    pub fn resolve(&self, extra: ConfigFile) -> Result<PublishConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config::config_path().context("could not locate config file")?,
        };
        let file = ConfigFile::load_at(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        let flags = ConfigFile {
            destination_root: self.destination.clone(),
            volatile_root: self.volatile.clone(),
            canonical_root: self.canonical.clone(),
            lock_root: self.lock_root.clone(),
            ..Default::default()
        };
        let layered = file.layer(ConfigFile::from_env()).layer(flags).layer(extra);
        PublishConfig::resolve(layered).context("invalid configuration")
    }
}

pub fn parse_namespace(raw: &str) -> Result<Namespace> {
    Namespace::parse(raw).with_context(|| format!("invalid namespace '{raw}'"))
}
