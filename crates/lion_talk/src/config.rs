//! Shard-talk configuration.
//!
//! Sources, later ones overriding earlier:
//! 1. Bundled defaults (`lion.toml` shipped with the workspace)
//! 2. `~/.config/lion/lion.toml`
//! 3. `./lion.toml`
//! 4. `LION_*` environment variables (`LION_SERVER__PORT=5050`)

use crate::{Address, PeerId};
use config::{Config, Environment, File, FileFormat};
use lion_error::{ConfigError, LionError, LionResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Identity and listener of the local peer.
///
/// # Example
///
/// ```toml
/// [peer]
/// appname = "leo"
/// host = "127.0.0.1"
/// port = 5001
/// shard_count = 2
/// shard_id = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base application name, shared by every shard.
    pub appname: String,
    /// Host to listen on and advertise.
    pub host: String,
    /// Port to listen on; `0` picks a free port.
    pub port: u16,
    /// Total number of shards.
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    /// This process's shard.
    #[serde(default)]
    pub shard_id: u32,
}

fn default_shard_count() -> u32 {
    1
}

impl PeerConfig {
    /// Identifier this shard registers under.
    pub fn peer_id(&self) -> PeerId {
        PeerId::for_shard(&self.appname, self.shard_count, self.shard_id)
    }

    /// Listener address.
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}

/// Delay between attempts to reach the rendezvous server.
///
/// Retries never stop; `jitter_ms` adds a random extra delay in
/// `0..=jitter_ms` to each wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Fixed delay in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum random extra delay in milliseconds.
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_interval_ms() -> u64 {
    30_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            jitter_ms: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Policy from durations.
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            jitter_ms: u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Next wait, including jitter.
    pub fn delay(&self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(self.interval_ms.saturating_add(jitter))
    }
}

/// Top-level shard-talk configuration.
///
/// # Example
///
/// ```no_run
/// use lion_talk::TalkConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TalkConfig::load()?;
/// println!("Server at {}", config.server);
/// println!("This shard is {}", config.peer.peer_id());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkConfig {
    /// Where the rendezvous server listens.
    pub server: Address,
    /// The local peer.
    pub peer: PeerConfig,
    /// Reconnect behaviour.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

const DEFAULT_CONFIG: &str = include_str!("../../../lion.toml");

const BUNDLED: &str = "bundled defaults";
const LAYERED: &str = "layered configuration";

impl TalkConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> LionResult<Self> {
        debug!("Loading configuration from file");
        let origin = path.as_ref().display().to_string();

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| LionError::from(ConfigError::read(&origin, e.to_string())))?
            .try_deserialize()
            .map_err(|e| LionError::from(ConfigError::parse(&origin, e.to_string())))
    }

    /// Load configuration with precedence: env > current dir > home dir > bundled.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> LionResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/lion/lion.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("lion").required(false))
            .add_source(
                Environment::with_prefix("LION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .map_err(|e| LionError::from(ConfigError::read(LAYERED, e.to_string())))?
            .try_deserialize()
            .map_err(|e| LionError::from(ConfigError::parse(LAYERED, e.to_string())))
    }

    /// The bundled defaults alone.
    pub fn bundled() -> LionResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| LionError::from(ConfigError::parse(BUNDLED, e.to_string())))
    }
}
