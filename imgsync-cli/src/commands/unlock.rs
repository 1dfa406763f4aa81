//! `imgsync unlock`: clear a run lock left by a killed run.

use anyhow::{Context, Result};
use clap::Args;

use imgsync_core::ConfigFile;
use imgsync_publish::{lock, LockState};

use super::{parse_namespace, ConfigArgs};
use crate::logging;

/// Arguments for `imgsync unlock`.
#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Collection namespace.
    pub namespace: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl UnlockArgs {
    pub fn run(self) -> Result<()> {
        let namespace = parse_namespace(&self.namespace)?;
        let config = self.config.resolve(ConfigFile::default())?;
        logging::init(config.log_file.as_deref());

        if let LockState::Held(info) = lock::inspect(&config.lock_root, &namespace)? {
            println!(
                "lock for '{namespace}' was taken by pid {} at {}",
                info.pid,
                info.started_at.to_rfc3339()
            );
        }

        let removed = lock::force_release(&config.lock_root, &namespace)
            .with_context(|| format!("failed to remove lock for '{namespace}'"))?;
        if removed {
            println!("✓ removed run lock for '{namespace}'");
        } else {
            println!("no run lock held for '{namespace}'");
        }
        Ok(())
    }
}
