use crate::{
    asset::{
        Address,
        AssetClass,
    },
    desk::DeskContext,
    odds::RaffleDefaults,
    reconcile::{
        DEFAULT_SETTLE_DELAY,
        ReconciliationScheduler,
    },
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::Duration,
};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "cosmic-claims.json";
pub const DEFAULT_API_URL: &str = "http://localhost:9090/api/cosmicgame";

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default)]
    pub game: Option<Address>,
    #[serde(default)]
    pub prizes_wallet: Option<Address>,
    #[serde(default)]
    pub cst_nft: Option<Address>,
    #[serde(default)]
    pub rwlk_nft: Option<Address>,
    #[serde(default)]
    pub cst_staking_wallet: Option<Address>,
    #[serde(default)]
    pub rwlk_staking_wallet: Option<Address>,
}

impl ContractAddresses {
    /// Spender that must be approved before staking `class`.
    pub fn staking_wallet(&self, class: AssetClass) -> Option<Address> {
        match class {
            AssetClass::NftCst => self.cst_staking_wallet,
            AssetClass::NftRwlk => self.rwlk_staking_wallet,
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub contracts: ContractAddresses,
    /// Wait between a confirmation and the refetch of the index.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_approval_recheck_attempts")]
    pub approval_recheck_attempts: u32,
    #[serde(default = "default_approval_recheck_interval_ms")]
    pub approval_recheck_interval_ms: u64,
    #[serde(default)]
    pub confirmation_timeout_ms: Option<u64>,
    #[serde(default)]
    pub raffle: RaffleDefaults,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_approval_recheck_attempts() -> u32 {
    1
}

fn default_approval_recheck_interval_ms() -> u64 {
    1_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            owner: None,
            contracts: ContractAddresses::default(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            approval_recheck_attempts: default_approval_recheck_attempts(),
            approval_recheck_interval_ms: default_approval_recheck_interval_ms(),
            confirmation_timeout_ms: None,
            raffle: RaffleDefaults::default(),
        }
    }
}

impl ClientConfig {
    pub fn api_url(&self) -> Result<Url> {
        Url::parse(&self.api_url)
            .with_context(|| format!("invalid api_url {:?}", self.api_url))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("api_url must be http or https, got {url}"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than zero"));
        }
        if self.raffle.eth_winners == 0 || self.raffle.nft_winners == 0 {
            return Err(anyhow!("raffle winner counts must be greater than zero"));
        }
        if let Some(owner) = self.owner
            && owner.is_zero()
        {
            return Err(anyhow!("owner must not be the zero address"));
        }
        Ok(())
    }

    /// Desk collaborators wired from this configuration.
    pub fn desk_context<R, C>(
        &self,
        read_api: Arc<R>,
        contracts: Arc<C>,
    ) -> Result<DeskContext<R, C>> {
        let owner = self
            .owner
            .ok_or_else(|| anyhow!("no owner address configured"))?;
        let mut ctx = DeskContext::new(owner, read_api, contracts)
            .with_scheduler(ReconciliationScheduler::new(self.settle_delay()))
            .with_approval_rechecks(
                self.approval_recheck_attempts,
                Duration::from_millis(self.approval_recheck_interval_ms),
            )
            .with_confirmation_timeout(self.confirmation_timeout());
        for class in AssetClass::ALL {
            if let Some(wallet) = self.contracts.staking_wallet(class) {
                ctx = ctx.with_staking_wallet(class, wallet);
            }
        }
        Ok(ctx)
    }
}

/// JSON file holding a [`ClientConfig`].
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, falling back to defaults when the file is absent.
    pub fn load(&self) -> Result<ClientConfig> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no config file, using defaults");
            return Ok(ClientConfig::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading config {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", self.path.display()))
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let mut file = fs::File::create(&self.path)
            .with_context(|| format!("writing config {}", self.path.display()))?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn deserialize__partial_document_fills_defaults() {
        // given
        let json = r#"{
            "owner": "0x1111111111111111111111111111111111111111",
            "contracts": { "cst_staking_wallet": "0x2222222222222222222222222222222222222222" },
            "settle_delay_ms": 4500
        }"#;

        // when
        let config: ClientConfig = serde_json::from_str(json).unwrap();

        // then
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.settle_delay(), Duration::from_millis(4500));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.raffle, RaffleDefaults::default());
        assert_eq!(
            config.contracts.staking_wallet(AssetClass::NftCst),
            Some(Address::new([0x22; 20]))
        );
        assert_eq!(config.contracts.staking_wallet(AssetClass::NftRwlk), None);
        config.validate().unwrap();
    }

    #[test]
    fn validate__rejects_bad_url_and_zero_poll() {
        // given
        let bad_url = ClientConfig {
            api_url: "not a url".into(),
            ..ClientConfig::default()
        };
        let zero_poll = ClientConfig {
            poll_interval_ms: 0,
            ..ClientConfig::default()
        };

        // then
        assert!(bad_url.validate().is_err());
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn config_store__missing_file_loads_defaults_and_save_round_trips() {
        // given
        let dir = std::env::temp_dir().join(format!(
            "cosmic-claims-config-{}",
            std::process::id()
        ));
        let store = ConfigStore::new(dir.join("nested").join(DEFAULT_CONFIG_FILE));

        // when
        let defaults = store.load().unwrap();
        let edited = ClientConfig {
            owner: Some(Address::new([0x33; 20])),
            settle_delay_ms: 6_000,
            ..defaults.clone()
        };
        store.save(&edited).unwrap();
        let reloaded = store.load().unwrap();

        // then
        assert_eq!(defaults, ClientConfig::default());
        assert_eq!(reloaded, edited);
        let _ = fs::remove_dir_all(dir);
    }
}
