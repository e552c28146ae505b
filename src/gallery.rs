use crate::coords::{Codec, PixelCoord};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Which half of the collection the gallery shows, selected by the token
/// naming convention: single pixels are named `"Pixel (x,y)"`, composed
/// tokens `"Composite..."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryFilter {
    Pixels,
    Composed,
}

impl GalleryFilter {
    pub fn label(&self) -> &'static str {
        match self {
            GalleryFilter::Pixels => "pixels",
            GalleryFilter::Composed => "composed",
        }
    }
}

pub fn matches_filter(name: &str, filter: GalleryFilter) -> bool {
    match filter {
        GalleryFilter::Pixels => name.contains("Pixel (") && !name.contains("Composite"),
        GalleryFilter::Composed => name.contains("Composite"),
    }
}

#[derive(Debug, Clone)]
pub struct GalleryToken {
    pub token_id: u64,
    pub name: String,
    pub description: String,
    pub image: String,
    pub owner: String,
    pub coord: Option<PixelCoord>,
    pub minted_at: Option<String>,
    pub acquired_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct IndexerTokenWrapper {
    token: IndexerToken,
    ownership: Option<IndexerOwnership>,
}

#[derive(Deserialize, Debug)]
struct IndexerToken {
    contract: Option<String>,
    #[serde(rename = "tokenId")]
    token_id: String,
    // The indexer serves null names for tokens it has not refreshed yet.
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
    owner: Option<String>,
    #[serde(rename = "mintedAt")]
    minted_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct IndexerOwnership {
    #[serde(rename = "acquiredAt")]
    acquired_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct IndexerResponse {
    tokens: Vec<IndexerTokenWrapper>,
}

#[derive(Debug)]
pub enum GalleryError {
    Network(reqwest::Error),
    Api { status: u16 },
    MissingApiKey,
}

impl std::fmt::Display for GalleryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GalleryError::Network(e) => write!(f, "indexer request failed: {}", e),
            GalleryError::Api { status } => write!(f, "indexer returned status {}", status),
            GalleryError::MissingApiKey => write!(f, "indexer API key not configured"),
        }
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        GalleryError::Network(err)
    }
}

/// Best-effort client for the third-party NFT indexing API. Failures
/// surface as an empty gallery, never as a blocking error.
#[derive(Debug, Clone)]
pub struct GalleryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    contract_address: String,
}

impl GalleryClient {
    pub fn new(base_url: String, api_key: Option<String>, contract_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            contract_address,
        }
    }

    pub async fn fetch_collection(
        &self,
        filter: GalleryFilter,
        limit: usize,
        codec: Codec,
    ) -> Result<Vec<GalleryToken>, GalleryError> {
        let url = format!(
            "{}/tokens?collection={}&limit={}",
            self.base_url,
            self.contract_address.to_lowercase(),
            limit
        );
        let response = self.get(&url).await?;
        Ok(self.convert(response, filter, None, codec))
    }

    pub async fn fetch_user(
        &self,
        user_address: &str,
        filter: GalleryFilter,
        limit: usize,
        codec: Codec,
    ) -> Result<Vec<GalleryToken>, GalleryError> {
        let url = format!(
            "{}/users/{}/tokens?limit={}",
            self.base_url, user_address, limit
        );
        let response = self.get(&url).await?;
        Ok(self.convert(response, filter, Some(user_address), codec))
    }

    async fn get(&self, url: &str) -> Result<IndexerResponse, GalleryError> {
        let api_key = self.api_key.as_ref().ok_or(GalleryError::MissingApiKey)?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", api_key))
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GalleryError::Api {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<IndexerResponse>().await?)
    }

    fn convert(
        &self,
        response: IndexerResponse,
        filter: GalleryFilter,
        owner_override: Option<&str>,
        codec: Codec,
    ) -> Vec<GalleryToken> {
        response
            .tokens
            .into_iter()
            .filter_map(|wrapper| {
                let token = wrapper.token;
                if let Some(contract) = &token.contract {
                    if !contract.eq_ignore_ascii_case(&self.contract_address) {
                        return None;
                    }
                }
                // Tokens with null names cannot be classified; skip them.
                let name = token.name?;
                if !matches_filter(&name, filter) {
                    return None;
                }
                let token_id = token.token_id.parse::<u64>().ok()?;
                Some(GalleryToken {
                    coord: codec.decode(token_id),
                    token_id,
                    name,
                    description: token.description.unwrap_or_default(),
                    image: token.image.unwrap_or_default(),
                    owner: owner_override
                        .map(str::to_string)
                        .or(token.owner)
                        .unwrap_or_default(),
                    minted_at: token.minted_at,
                    acquired_at: wrapper.ownership.and_then(|o| o.acquired_at),
                })
            })
            .collect()
    }
}

/// Short-TTL cache over indexer results, keyed by query shape. Owned by
/// the app thread; fetch tasks bypass it and the app stores what they
/// bring back.
#[derive(Debug, Default)]
pub struct GalleryCache {
    entries: HashMap<String, (Vec<GalleryToken>, Instant)>,
}

impl GalleryCache {
    pub fn key(scope: &str, user: Option<&str>, filter: GalleryFilter) -> String {
        format!("{}-{}-{}", scope, user.unwrap_or("all"), filter.label())
    }

    pub fn get(&self, key: &str, now: Instant, ttl: Duration) -> Option<&[GalleryToken]> {
        let (tokens, stored_at) = self.entries.get(key)?;
        if now.duration_since(*stored_at) < ttl {
            Some(tokens)
        } else {
            None
        }
    }

    pub fn put(&mut self, key: String, tokens: Vec<GalleryToken>, now: Instant) {
        self.entries.insert(key, (tokens, now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_splits_pixels_from_composites() {
        assert!(matches_filter("Pixel (3,7)", GalleryFilter::Pixels));
        assert!(!matches_filter("Pixel (3,7)", GalleryFilter::Composed));
        assert!(matches_filter("Composite Pixel Art #2", GalleryFilter::Composed));
        assert!(!matches_filter("Composite Pixel Art #2", GalleryFilter::Pixels));
        assert!(!matches_filter("Something Else", GalleryFilter::Pixels));
    }

    #[test]
    fn cache_respects_ttl() {
        let mut cache = GalleryCache::default();
        let now = Instant::now();
        let key = GalleryCache::key("minted", None, GalleryFilter::Pixels);
        cache.put(key.clone(), Vec::new(), now);

        let ttl = Duration::from_secs(60);
        assert!(cache.get(&key, now + Duration::from_secs(30), ttl).is_some());
        assert!(cache.get(&key, now + Duration::from_secs(61), ttl).is_none());
    }

    #[test]
    fn cache_keys_separate_user_and_filter() {
        let a = GalleryCache::key("user", Some("0xabc"), GalleryFilter::Pixels);
        let b = GalleryCache::key("user", Some("0xabc"), GalleryFilter::Composed);
        let c = GalleryCache::key("minted", None, GalleryFilter::Pixels);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
