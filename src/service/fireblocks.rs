//! HTTP client for the Fireblocks API
//!
//! Every request is authenticated with an RS256 JWT whose `bodyHash` claim
//! commits to the exact body bytes sent.

use super::{
    CreateTransactionResponse, DepositAddress, FeeEstimate, SigningService, TransactionInfo,
    TransactionRequest, VaultAsset,
};
use crate::config::ServiceConfig;
use crate::error::{Result, TransferError};
use crate::types::{Utxo, UtxoInput, VaultId};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT lifetime in seconds
const TOKEN_TTL_SECS: u64 = 55;

/// Fireblocks signing service client
pub struct FireblocksClient {
    api_key: String,
    encoding_key: EncodingKey,
    base_url: String,
    client: Client,
}

// ========== API wire types ==========

#[derive(Debug, Serialize)]
struct Claims<'a> {
    uri: &'a str,
    nonce: String,
    iat: u64,
    exp: u64,
    sub: &'a str,
    #[serde(rename = "bodyHash")]
    body_hash: String,
}

#[derive(Debug, Deserialize)]
struct AddressesPage {
    #[serde(default)]
    addresses: Vec<DepositAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnspentInputResponse {
    input: UtxoInput,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    amount: Option<String>,
}

impl FireblocksClient {
    /// Create a client from explicit configuration
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let encoding_key = EncodingKey::from_rsa_pem(config.secret_key_pem.as_bytes())
            .map_err(|e| TransferError::Configuration(format!("Invalid secret key: {}", e)))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                TransferError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: config.api_key.clone(),
            encoding_key,
            base_url: config.base_url.clone(),
            client,
        })
    }

    /// Sign the request JWT for `path` (including query) and `body`
    fn sign_request(&self, path: &str, body: &str) -> Result<String> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TransferError::Configuration(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            uri: path,
            nonce: uuid::Uuid::new_v4().to_string(),
            iat,
            exp: iat + TOKEN_TTL_SECS,
            sub: &self.api_key,
            body_hash: body_hash(body),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| TransferError::Configuration(format!("Failed to sign request: {}", e)))
    }

    /// Send one authenticated request and return the raw response body
    async fn send(&self, method: Method, path: &str, body: Option<String>) -> Result<String> {
        let body = body.unwrap_or_default();
        let token = self.sign_request(path, &body)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header("X-API-Key", &self.api_key);
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::debug!("{} {} failed: {} - {}", method, path, status, text);
            return Err(TransferError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let text = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_string(body)?;
        let text = self.send(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl SigningService for FireblocksClient {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<CreateTransactionResponse> {
        let created: CreateTransactionResponse = self.post("/v1/transactions", request).await?;
        tracing::info!(
            "Created transaction {} ({:?}, status {})",
            created.id,
            request.operation,
            created.status
        );
        Ok(created)
    }

    async fn get_transaction_by_id(&self, transaction_id: &str) -> Result<TransactionInfo> {
        self.get(&format!("/v1/transactions/{}", transaction_id))
            .await
    }

    async fn cancel_transaction_by_id(&self, transaction_id: &str) -> Result<()> {
        #[derive(Deserialize)]
        struct CancelResponse {
            #[serde(default)]
            success: bool,
        }

        let resp: CancelResponse = self
            .post(
                &format!("/v1/transactions/{}/cancel", transaction_id),
                &serde_json::json!({}),
            )
            .await?;

        if !resp.success {
            return Err(TransferError::Api {
                status: 200,
                body: format!("Cancellation of {} was not acknowledged", transaction_id),
            });
        }
        Ok(())
    }

    async fn get_deposit_addresses(
        &self,
        vault_id: VaultId,
        asset_id: &str,
    ) -> Result<Vec<DepositAddress>> {
        let page: AddressesPage = self
            .get(&format!(
                "/v1/vault/accounts/{}/{}/addresses_paginated",
                vault_id, asset_id
            ))
            .await?;
        Ok(page.addresses)
    }

    async fn get_unspent_inputs(&self, vault_id: VaultId, asset_id: &str) -> Result<Vec<Utxo>> {
        let inputs: Vec<UnspentInputResponse> = self
            .get(&format!(
                "/v1/vault/accounts/{}/{}/unspent_inputs",
                vault_id, asset_id
            ))
            .await?;

        inputs
            .into_iter()
            .map(|unspent| {
                let amount = unspent
                    .amount
                    .map(|a| {
                        a.parse().map_err(|_| {
                            TransferError::Encoding(format!("Invalid UTXO amount '{}'", a))
                        })
                    })
                    .transpose()?;
                Ok(Utxo {
                    tx_hash: unspent.input.tx_hash,
                    index: unspent.input.index,
                    amount,
                    address: unspent.address,
                })
            })
            .collect()
    }

    async fn estimate_fee_for_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<FeeEstimate> {
        self.post("/v1/transactions/estimate_fee", request).await
    }

    async fn get_vault_asset(&self, vault_id: VaultId, asset_id: &str) -> Result<VaultAsset> {
        self.get(&format!("/v1/vault/accounts/{}/{}", vault_id, asset_id))
            .await
    }
}

/// Hex SHA-256 of the request body (empty string for bodiless requests)
fn body_hash(body: &str) -> String {
    alloy::hex::encode(Sha256::digest(body.as_bytes()))
}
