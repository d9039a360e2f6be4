//! Bearer-token validation against an OAuth issuer's JWKS document.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context, Result};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::OAuthConfig;

/// The claims this service consumes: `sub` keys the profile document,
/// `email` fills it on first login.
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct OAuthValidator {
    issuer: String,
    audience: String,
    jwks_uri: String,
    client: Client,
    keys: Arc<RwLock<HashMap<String, Arc<DecodingKey>>>>,
    last_refresh: Arc<RwLock<Option<Instant>>>,
    cache_ttl: Duration,
}

impl OAuthValidator {
    pub async fn from_config(config: &OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client for OAuth validation")?;

        let jwks_uri = resolve_jwks_uri(config, &client).await?;
        let validator = Self {
            issuer: config.issuer_url.clone(),
            audience: config.audience.clone(),
            jwks_uri,
            client,
            keys: Arc::new(RwLock::new(HashMap::new())),
            last_refresh: Arc::new(RwLock::new(None)),
            cache_ttl: Duration::from_secs(config.jwks_cache_ttl_secs.max(60)),
        };

        // Prime the key cache so the first request doesn't pay the fetch;
        // a failure here is retried on first use instead of aborting boot.
        if let Err(err) = validator.refresh_keys().await {
            warn!("failed to prime the JWKS cache: {err}");
        }

        Ok(validator)
    }

    pub async fn validate(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("failed to parse token header")?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow!("token header missing 'kid'"))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, key.as_ref(), &validation)
            .context("token failed signature or claim validation")?;

        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        self.ensure_fresh_keys(kid).await?;

        let keys = self.keys.read().await;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| anyhow!("no JWKS entry found for key id '{kid}'"))
    }

    async fn ensure_fresh_keys(&self, kid: &str) -> Result<()> {
        let expired = {
            let last = self.last_refresh.read().await;
            match *last {
                Some(at) => at.elapsed() > self.cache_ttl,
                None => true,
            }
        };

        let missing = {
            let keys = self.keys.read().await;
            !keys.contains_key(kid)
        };

        if expired || missing {
            debug!(expired, missing, "refreshing JWKS cache");
            self.refresh_keys().await?;
        }

        Ok(())
    }

    async fn refresh_keys(&self) -> Result<()> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .context("failed to request JWKS")?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?
            .json()
            .await
            .context("failed to parse JWKS response")?;

        let mut new_keys: HashMap<String, Arc<DecodingKey>> = HashMap::new();
        for jwk in jwks.keys {
            let Some(kid) = jwk.kid else {
                warn!("skipping JWKS entry without 'kid'");
                continue;
            };

            if jwk.kty != "RSA" {
                warn!("skipping unsupported JWKS key type: {}", jwk.kty);
                continue;
            }

            let n = jwk
                .n
                .as_deref()
                .ok_or_else(|| anyhow!("JWKS RSA key missing modulus"))?;
            let e = jwk
                .e
                .as_deref()
                .ok_or_else(|| anyhow!("JWKS RSA key missing exponent"))?;
            let key = DecodingKey::from_rsa_components(n, e)
                .context("failed to build RSA decoding key from JWKS entry")?;
            new_keys.insert(kid, Arc::new(key));
        }

        if new_keys.is_empty() {
            bail!("JWKS response did not contain any usable keys");
        }

        *self.keys.write().await = new_keys;
        *self.last_refresh.write().await = Some(Instant::now());

        Ok(())
    }
}

async fn resolve_jwks_uri(config: &OAuthConfig, client: &Client) -> Result<String> {
    if let Some(url) = &config.jwks_url {
        return Ok(url.clone());
    }

    let issuer = config.issuer_url.trim_end_matches('/');
    let discovery_url = format!("{issuer}/.well-known/openid-configuration");
    let metadata: OpenIdProviderMetadata = client
        .get(&discovery_url)
        .send()
        .await
        .context("failed to request OpenID provider metadata")?
        .error_for_status()
        .context("OpenID provider metadata endpoint returned an error status")?
        .json()
        .await
        .context("failed to parse OpenID provider metadata")?;

    metadata
        .jwks_uri
        .ok_or_else(|| anyhow!("OpenID provider metadata did not include 'jwks_uri'"))
}

#[derive(Debug, Deserialize)]
struct OpenIdProviderMetadata {
    jwks_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default)]
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}
