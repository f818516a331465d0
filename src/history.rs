//! Transaction history service client
//!
//! Read-only view of a user's past bridge transfers as recorded by an external
//! indexer. The bridge core never writes to it.

use alloy::primitives::Address;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{BridgeError, Result};
use crate::types::ChainId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One transfer as reported by the history service
///
/// Fields the client does not know are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTransaction {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub to_chain_id: Option<u64>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// HTTP client for `GET /api/transactions/...`
#[derive(Debug, Clone)]
pub struct HistoryClient {
    base_url: Url,
    client: Client,
}

impl HistoryClient {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::connectivity("history client", e))?;
        Ok(Self { base_url, client })
    }

    /// Endpoint for a user's transfers, optionally narrowed to one chain
    pub fn transactions_url(&self, user: Address, chain_id: Option<ChainId>) -> Result<Url> {
        let path = match chain_id {
            Some(chain) => format!("api/transactions/{}/{}", user, chain),
            None => format!("api/transactions/{}", user),
        };
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(&path)
            .map_err(|e| BridgeError::Precondition(format!("invalid history URL: {}", e)))
    }

    pub async fn transactions(
        &self,
        user: Address,
        chain_id: Option<ChainId>,
    ) -> Result<Vec<HistoryTransaction>> {
        let url = self.transactions_url(user, chain_id)?;
        debug!(url = %url, "Fetching transaction history");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BridgeError::connectivity("history request", e))?;

        if !response.status().is_success() {
            return Err(BridgeError::Connectivity(format!(
                "history service returned {} for {}",
                response.status(),
                url
            )));
        }

        response
            .json::<Vec<HistoryTransaction>>()
            .await
            .map_err(|e| BridgeError::connectivity("history response", e))
    }
}
