//! Google Sheets `values` API backend for the rates sheet.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::HEADER;
use crate::store::RecordStore;

const SPREADSHEET_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh the cached access token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Service-account credentials as exported by the Google console.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read service account file: {}",
                path.as_ref().display()
            )
        })?;
        serde_json::from_str(&raw).with_context(|| {
            format!(
                "Failed to parse service account file: {}",
                path.as_ref().display()
            )
        })
    }
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum TokenSource {
    /// Fixed bearer token, for tests and pre-issued credentials.
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Option<Vec<Vec<String>>>,
}

/// One spreadsheet tab addressed through the Sheets REST API.
///
/// The handle is cheap to share; each call sends its own HTTP request, and
/// the only state is the cached OAuth token.
pub struct SheetsStore {
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    client: reqwest::Client,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl SheetsStore {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        key: ServiceAccountKey,
    ) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not valid RSA PEM")?;
        Ok(Self::build(
            base_url,
            spreadsheet_id,
            worksheet,
            TokenSource::ServiceAccount { key, signing_key },
        ))
    }

    /// Store that sends a caller-supplied bearer token on every request.
    pub fn with_static_token(
        base_url: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        token: &str,
    ) -> Self {
        Self::build(
            base_url,
            spreadsheet_id,
            worksheet,
            TokenSource::Static(token.to_string()),
        )
    }

    fn build(base_url: &str, spreadsheet_id: &str, worksheet: &str, source: TokenSource) -> Self {
        SheetsStore {
            base_url: base_url.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            client: reqwest::Client::new(),
            source,
            cached: Mutex::new(None),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }

    fn row_range(&self, row_number: usize) -> String {
        format!("{}!A{row}:E{row}", self.worksheet, row = row_number)
    }

    /// Bearer token for the next request, minting a fresh one via the
    /// JWT-bearer grant when the cached token is gone or about to expire.
    async fn access_token(&self) -> Result<String> {
        let (key, signing_key) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount { key, signing_key } => (key, signing_key),
        };

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.token.clone());
            }
            debug!("Sheets access token expired, refreshing");
        }

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &key.client_email,
            scope: SPREADSHEET_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, signing_key)
            .context("Failed to sign service account assertion")?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token endpoint returned HTTP {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Malformed token response")?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn check(response: reqwest::Response, op: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("Sheet {op} failed with HTTP {status}: {body}"))
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let url = self.values_url(&self.worksheet);
        debug!("Reading sheet values from {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("Sheet read request failed")?;
        let response = Self::check(response, "read").await?;

        let body: ValuesResponse = response
            .json()
            .await
            .context("Malformed sheet read response")?;
        // An empty sheet comes back without a `values` field at all.
        Ok(body.values.unwrap_or_default())
    }

    async fn update_row(&self, row_number: usize, values: Vec<String>) -> Result<()> {
        let token = self.access_token().await?;
        let range = self.row_range(row_number);
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(&range));
        debug!("Updating sheet range {}", range);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "values": [values] }))
            .send()
            .await
            .with_context(|| format!("Sheet update request failed for {range}"))?;
        Self::check(response, "update").await?;
        Ok(())
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let token = self.access_token().await?;
        let range = format!("{}!A1:E1", self.worksheet);
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.values_url(&range)
        );
        debug!("Appending {} rows to sheet", rows.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await
            .context("Sheet append request failed")?;
        Self::check(response, "append").await?;
        Ok(())
    }

    async fn write_header(&self) -> Result<()> {
        let header: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();
        self.update_row(1, header).await
    }
}
