use crate::{
    asset::{
        Address,
        AssetClass,
        AssetRef,
        Listing,
    },
    odds::RaffleDefaults,
    read_api::{
        self,
        ReadApi,
        ReadError,
        RoundSummary,
    },
};
use reqwest::StatusCode;
use tracing::{
    debug,
    warn,
};

/// HTTP client for the game's indexing API.
#[derive(Clone)]
pub struct IndexerClient {
    base_url: String,
    http: reqwest::Client,
    raffle_defaults: RaffleDefaults,
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReadError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ReadError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, http))
    }

    /// Use an already configured `reqwest` client.
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            raffle_defaults: RaffleDefaults::default(),
        }
    }

    /// Winner counts used when a round summary omits them.
    pub fn with_raffle_defaults(mut self, defaults: RaffleDefaults) -> Self {
        self.raffle_defaults = defaults;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, returning `None` on 404.
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, ReadError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "indexer request");
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ReadError::Transport(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ReadError::Transport(format!("failed to read body: {e}")))?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(%url, %status, "indexer request failed");
            return Err(ReadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(bytes.to_vec()))
    }
}

impl ReadApi for IndexerClient {
    async fn round_summary(&self, round: Option<u64>) -> Result<RoundSummary, ReadError> {
        let path = match round {
            Some(round) => format!("rounds/{round}"),
            None => "rounds/current".to_string(),
        };
        match self.fetch(&path).await? {
            Some(bytes) => read_api::parse_round_summary(&bytes, &self.raffle_defaults),
            None => Err(ReadError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("no round at {path}"),
            }),
        }
    }

    async fn user_bids(&self, owner: &Address, round: u64) -> Result<u64, ReadError> {
        match self.fetch(&format!("bids/{owner}/{round}")).await? {
            Some(bytes) => read_api::parse_user_bids(&bytes),
            None => Ok(0),
        }
    }

    async fn listing(
        &self,
        owner: &Address,
        class: AssetClass,
        listing: Listing,
    ) -> Result<Vec<AssetRef>, ReadError> {
        let path = format!("assets/{owner}/{}/{}", class.slug(), listing.slug());
        match self.fetch(&path).await? {
            Some(bytes) => read_api::parse_listing(class, &bytes),
            None => Ok(Vec::new()),
        }
    }
}
