//! CLI configuration: defaults, optional TOML file, `PLAYVAULT__` env vars.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use playvault_core::constants::{DEFAULT_SLIPPAGE_BPS, DEFAULT_WALLET_TTL_SECS, MAX_SLIPPAGE_BPS, Network};
use playvault_swap::{SlippagePolicy, SwapSettings};
use playvault_wallet::EnvelopeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Envelope data key, base64 or hex. Required for wallet commands.
    #[serde(default)]
    pub data_key: Option<String>,
    pub data_dir: PathBuf,
    pub network: Network,
    /// Overrides the network's wrap contract.
    #[serde(default)]
    pub wrap_contract: Option<String>,
    /// Overrides the network's exchange contract.
    #[serde(default)]
    pub exchange_contract: Option<String>,
    pub slippage_bps: u32,
    pub wallet_ttl_secs: i64,
    pub log_format: LogFormat,
}

/// `~/.playvault`, or `.playvault` when there is no home directory.
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".playvault"))
        .unwrap_or_else(|| PathBuf::from(".playvault"))
}

pub fn default_config_path() -> PathBuf {
    default_home().join("config.toml")
}

impl CliConfig {
    /// Load configuration from file and environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .set_default("data_dir", default_home().to_string_lossy().to_string())?
            .set_default("network", "mainnet")?
            .set_default("slippage_bps", DEFAULT_SLIPPAGE_BPS as i64)?
            .set_default("wallet_ttl_secs", DEFAULT_WALLET_TTL_SECS)?
            .set_default("log_format", "text")?
            .add_source(config::File::from(path).required(false))
            // PLAYVAULT__DATA_KEY, PLAYVAULT__NETWORK, ...
            // Values stay strings so hex keys are never read as numbers.
            .add_source(
                config::Environment::with_prefix("PLAYVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: CliConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.slippage_bps > MAX_SLIPPAGE_BPS {
            bail!("slippage_bps cannot exceed {MAX_SLIPPAGE_BPS} (100%)");
        }
        if self.wallet_ttl_secs <= 0 {
            bail!("wallet_ttl_secs must be positive");
        }
        if let Some(key) = &self.data_key {
            EnvelopeKey::parse(key).context("data_key is malformed")?;
        }
        Ok(())
    }

    /// The configured envelope key.
    pub fn envelope_key(&self) -> Result<EnvelopeKey> {
        let text = self
            .data_key
            .as_deref()
            .context("data_key is not configured (set PLAYVAULT__DATA_KEY)")?;
        Ok(EnvelopeKey::parse(text)?)
    }

    pub fn wallet_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.wallet_ttl_secs)
    }

    pub fn swap_settings(&self) -> Result<SwapSettings> {
        let mut settings = SwapSettings::for_network(self.network)
            .with_slippage(SlippagePolicy::new(self.slippage_bps)?);
        if let Some(wrap) = &self.wrap_contract {
            settings.wrap_contract = wrap.clone();
        }
        if let Some(exchange) = &self.exchange_contract {
            settings.exchange_contract = exchange.clone();
        }
        Ok(settings)
    }
}
