//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::dispatch::DispatchConfig;
use crate::sound::Tempo;

/// Which hardware backend drives the gadget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Real brick via ev3dev sysfs
    Ev3dev,
    /// Log-only, for development
    DryRun,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ev3dev" => Ok(Backend::Ev3dev),
            "dry-run" | "dry_run" => Ok(Backend::DryRun),
            other => bail!("unknown backend {other:?} (expected \"ev3dev\" or \"dry-run\")"),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket the bridge connects to
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    pub backend: Backend,

    /// Root of the ev3dev device classes
    pub sysfs_root: PathBuf,

    /// Program used to play tones
    pub beep_command: String,

    pub tempo: Tempo,

    /// Speed and gearing handed to the dispatcher
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("flag-gadget");

        let socket_path = lookup("GADGET_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("gadget.sock"));

        let backend = match lookup("GADGET_BACKEND") {
            Some(raw) => raw.parse()?,
            None => Backend::Ev3dev,
        };

        let sysfs_root = lookup("GADGET_SYSFS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/sys/class"));

        let beep_command = lookup("GADGET_BEEP").unwrap_or_else(|| "beep".to_string());

        let mut dispatch = DispatchConfig::default();
        if let Some(raw) = lookup("GADGET_SPEED") {
            let speed: u8 = raw
                .parse()
                .with_context(|| format!("invalid GADGET_SPEED {raw:?}"))?;
            if speed > 100 {
                bail!("GADGET_SPEED must be a percentage between 0 and 100, got {speed}");
            }
            dispatch.speed_percent = speed;
        }

        let tempo = match lookup("GADGET_TEMPO") {
            Some(raw) => {
                let bpm: u32 = raw
                    .parse()
                    .with_context(|| format!("invalid GADGET_TEMPO {raw:?}"))?;
                if bpm == 0 {
                    bail!("GADGET_TEMPO must be positive");
                }
                Tempo(bpm)
            }
            None => Tempo::default(),
        };

        Ok(Self {
            socket_path,
            data_dir,
            backend,
            sysfs_root,
            beep_command,
            tempo,
            dispatch,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}
