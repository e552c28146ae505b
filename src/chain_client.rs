use crate::coords::PixelCoord;
use crate::pixel_store::ChunkPixelResult;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Gateway error code raised when the user declines a signature request.
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Deserialize, Debug)]
struct ReadResponse {
    result: Value,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MulticallEntry {
    pub status: String,
    pub result: Option<Value>,
}

impl MulticallEntry {
    pub fn success(&self) -> Option<&Value> {
        if self.status == "success" {
            self.result.as_ref()
        } else {
            None
        }
    }
}

#[derive(Deserialize, Debug)]
struct MulticallResponse {
    results: Vec<MulticallEntry>,
}

#[derive(Deserialize, Debug)]
struct WriteResponse {
    #[serde(rename = "txHash")]
    tx_hash: String,
}

#[derive(Deserialize, Debug)]
pub struct ReceiptResponse {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub event: String,
    pub args: Value,
}

#[derive(Deserialize, Debug)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    #[serde(rename = "nextBlock")]
    pub next_block: u64,
}

#[derive(Deserialize, Debug)]
struct GatewayErrorBody {
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Clone)]
pub struct CompositionInfo {
    pub token_ids: Vec<u64>,
    pub min_x: u16,
    pub min_y: u16,
    pub max_x: u16,
    pub max_y: u16,
}

#[derive(Debug)]
pub enum ChainError {
    Network(reqwest::Error),
    /// The gateway rejected the call: simulation revert, user-declined
    /// signature, unknown function.
    Gateway { code: Option<i64>, message: String },
    UnexpectedResponse(String),
}

impl ChainError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, ChainError::Gateway { code: Some(c), .. } if *c == USER_REJECTED_CODE)
    }
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Network(e) => write!(f, "network error: {}", e),
            ChainError::Gateway { message, .. } => write!(f, "{}", message),
            ChainError::UnexpectedResponse(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Network(err)
    }
}

/// HTTP client for the wallet gateway, which holds the user's session and
/// does ABI encoding/signing. This client only speaks JSON; every contract
/// interaction the app needs goes through the typed wrappers below.
#[derive(Debug, Clone)]
pub struct ChainClient {
    client: reqwest::Client,
    gateway_url: String,
}

impl ChainClient {
    pub fn new(gateway_url: String) -> Self {
        ChainClient {
            client: reqwest::Client::new(),
            gateway_url,
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ChainError> {
        let url = format!("{}{}", self.gateway_url, path);
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ChainError::UnexpectedResponse(format!(
                "failed to read response body (status {}): {}",
                status, e
            ))
        })?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| {
                ChainError::UnexpectedResponse(format!(
                    "failed to parse {} response: {} (body: {})",
                    path, e, text
                ))
            })
        } else {
            match serde_json::from_str::<GatewayErrorBody>(&text) {
                Ok(body) => Err(ChainError::Gateway {
                    code: body.code,
                    message: body.message,
                }),
                Err(_) => Err(ChainError::UnexpectedResponse(format!(
                    "gateway returned status {}: {}",
                    status, text
                ))),
            }
        }
    }

    pub async fn read(&self, function: &str, args: Value) -> Result<Value, ChainError> {
        let response: ReadResponse = self
            .post("/rpc/read", json!({ "function": function, "args": args }))
            .await?;
        Ok(response.result)
    }

    pub async fn multicall(
        &self,
        calls: Vec<(&str, Value)>,
    ) -> Result<Vec<MulticallEntry>, ChainError> {
        let expected = calls.len();
        let calls: Vec<Value> = calls
            .into_iter()
            .map(|(function, args)| json!({ "function": function, "args": args }))
            .collect();
        let response: MulticallResponse =
            self.post("/rpc/multicall", json!({ "calls": calls })).await?;
        if response.results.len() != expected {
            return Err(ChainError::UnexpectedResponse(format!(
                "multicall returned {} results for {} calls",
                response.results.len(),
                expected
            )));
        }
        Ok(response.results)
    }

    pub async fn write(&self, function: &str, args: Value) -> Result<String, ChainError> {
        let response: WriteResponse = self
            .post("/rpc/write", json!({ "function": function, "args": args }))
            .await?;
        Ok(response.tx_hash)
    }

    /// Poll the gateway until the transaction leaves the mempool.
    pub async fn wait_for_receipt(&self, hash: &str) -> Result<ReceiptResponse, ChainError> {
        const POLL_INTERVAL: Duration = Duration::from_secs(1);
        const MAX_ATTEMPTS: u32 = 120;

        for _ in 0..MAX_ATTEMPTS {
            let receipt: ReceiptResponse =
                self.post("/rpc/receipt", json!({ "hash": hash })).await?;
            if receipt.status != "pending" {
                return Ok(receipt);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(ChainError::UnexpectedResponse(format!(
            "transaction {} still pending after {} polls",
            hash, MAX_ATTEMPTS
        )))
    }

    pub async fn logs(&self, event: &str, from_block: u64) -> Result<LogsResponse, ChainError> {
        self.post(
            "/rpc/logs",
            json!({ "event": event, "fromBlock": from_block }),
        )
        .await
    }

    // --- typed reads ---

    pub async fn owner_of(&self, token_id: u64) -> Result<String, ChainError> {
        let value = self.read("ownerOf", json!([token_id])).await?;
        expect_str(&value)
    }

    pub async fn get_color(&self, x: u16, y: u16) -> Result<String, ChainError> {
        let value = self.read("getColor", json!([x, y])).await?;
        expect_str(&value)
    }

    pub async fn total_minted(&self) -> Result<u64, ChainError> {
        let value = self.read("totalMinted", json!([])).await?;
        expect_u64(&value)
    }

    pub async fn token_uri(&self, token_id: u64) -> Result<String, ChainError> {
        let value = self.read("tokenURI", json!([token_id])).await?;
        expect_str(&value)
    }

    pub async fn contract_uri(&self) -> Result<String, ChainError> {
        let value = self.read("contractURI", json!([])).await?;
        expect_str(&value)
    }

    pub async fn is_pixel_authorized(
        &self,
        x: u16,
        y: u16,
        operator: &str,
    ) -> Result<bool, ChainError> {
        let value = self
            .read("isPixelAuthorized", json!([x, y, operator]))
            .await?;
        value
            .as_bool()
            .ok_or_else(|| ChainError::UnexpectedResponse(format!("expected bool, got {}", value)))
    }

    pub async fn get_owned_pixels_in_area(
        &self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        owner: &str,
    ) -> Result<Vec<u64>, ChainError> {
        let value = self
            .read("getOwnedPixelsInArea", json!([x1, y1, x2, y2, owner]))
            .await?;
        expect_u64_array(&value)
    }

    pub async fn get_minted_pixels_in_range(
        &self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
    ) -> Result<Vec<u64>, ChainError> {
        let value = self
            .read("getMintedPixelsInRange", json!([x1, y1, x2, y2]))
            .await?;
        expect_u64_array(&value)
    }

    /// Fresh SVG data-URIs for a batch of token ids; the parallel bool
    /// vector marks which tokens exist.
    pub async fn get_batch_token_images(
        &self,
        token_ids: &[u64],
    ) -> Result<(Vec<String>, Vec<bool>), ChainError> {
        let value = self.read("getBatchTokenImages", json!([token_ids])).await?;
        let pair = value.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
            ChainError::UnexpectedResponse(format!("expected [images, exists], got {}", value))
        })?;
        let images = pair[0]
            .as_array()
            .map(|a| a.iter().map(|v| v.as_str().unwrap_or("").to_string()).collect())
            .ok_or_else(|| {
                ChainError::UnexpectedResponse("images was not an array".to_string())
            })?;
        let exists = pair[1]
            .as_array()
            .map(|a| a.iter().map(|v| v.as_bool().unwrap_or(false)).collect())
            .ok_or_else(|| {
                ChainError::UnexpectedResponse("exists was not an array".to_string())
            })?;
        Ok((images, exists))
    }

    pub async fn get_composition_info(
        &self,
        composite_id: u64,
    ) -> Result<CompositionInfo, ChainError> {
        let value = self.read("getCompositionInfo", json!([composite_id])).await?;
        let parts = value.as_array().filter(|a| a.len() == 5).ok_or_else(|| {
            ChainError::UnexpectedResponse(format!(
                "expected [tokenIds, minX, minY, maxX, maxY], got {}",
                value
            ))
        })?;
        Ok(CompositionInfo {
            token_ids: expect_u64_array(&parts[0])?,
            min_x: expect_u64(&parts[1])? as u16,
            min_y: expect_u64(&parts[2])? as u16,
            max_x: expect_u64(&parts[3])? as u16,
            max_y: expect_u64(&parts[4])? as u16,
        })
    }

    /// Snapshot one chunk: an owner lookup and a color lookup per pixel,
    /// batched through multicall. A pixel reads as minted only when both
    /// of its calls succeed (`ownerOf` reverts for unminted tokens).
    pub async fn fetch_chunk(
        &self,
        pixels: &[(PixelCoord, u64)],
    ) -> Result<Vec<ChunkPixelResult>, ChainError> {
        let owner_calls: Vec<(&str, Value)> = pixels
            .iter()
            .map(|(_, token_id)| ("ownerOf", json!([token_id])))
            .collect();
        let color_calls: Vec<(&str, Value)> = pixels
            .iter()
            .map(|(coord, _)| ("getColor", json!([coord.x, coord.y])))
            .collect();

        let (owners, colors) =
            tokio::try_join!(self.multicall(owner_calls), self.multicall(color_calls))?;

        let results = pixels
            .iter()
            .zip(owners.iter().zip(colors.iter()))
            .map(|((coord, _), (owner, color))| {
                let outcome = match (owner.success(), color.success()) {
                    (Some(owner), Some(color)) => {
                        let owner = owner.as_str().unwrap_or_default().to_string();
                        let color = color.as_str().unwrap_or_default().to_string();
                        Some((owner, color))
                    }
                    _ => None,
                };
                (*coord, outcome)
            })
            .collect();
        Ok(results)
    }

    /// Direct owner+color re-read of a handful of pixels (fallback path).
    pub async fn fetch_pixels(
        &self,
        pixels: &[(PixelCoord, u64)],
    ) -> Result<Vec<ChunkPixelResult>, ChainError> {
        self.fetch_chunk(pixels).await
    }

    // --- writes ---

    pub async fn mint(&self, x: u16, y: u16, color: &str) -> Result<String, ChainError> {
        self.write("mint", json!([x, y, color])).await
    }

    pub async fn update_color(&self, x: u16, y: u16, color: &str) -> Result<String, ChainError> {
        self.write("updateColor", json!([x, y, color])).await
    }

    pub async fn batch_mint(&self, pixels: &[(PixelCoord, String)]) -> Result<String, ChainError> {
        let (xs, ys, colors) = split_batch(pixels);
        self.write("batchMint", json!([xs, ys, colors])).await
    }

    pub async fn batch_update_color(
        &self,
        pixels: &[(PixelCoord, String)],
    ) -> Result<String, ChainError> {
        let (xs, ys, colors) = split_batch(pixels);
        self.write("batchUpdateColor", json!([xs, ys, colors])).await
    }

    pub async fn approve_pixel(
        &self,
        x: u16,
        y: u16,
        operator: &str,
    ) -> Result<String, ChainError> {
        self.write("approvePixel", json!([x, y, operator])).await
    }

    pub async fn batch_approve(
        &self,
        pixels: &[PixelCoord],
        operator: &str,
    ) -> Result<String, ChainError> {
        let xs: Vec<u16> = pixels.iter().map(|p| p.x).collect();
        let ys: Vec<u16> = pixels.iter().map(|p| p.y).collect();
        self.write("batchApprove", json!([xs, ys, operator])).await
    }

    pub async fn batch_approve_multiple(
        &self,
        pixels: &[PixelCoord],
        operators: &[String],
    ) -> Result<String, ChainError> {
        let xs: Vec<u16> = pixels.iter().map(|p| p.x).collect();
        let ys: Vec<u16> = pixels.iter().map(|p| p.y).collect();
        self.write("batchApproveMultipleAddresses", json!([xs, ys, operators]))
            .await
    }

    pub async fn compose_pixels(
        &self,
        start_x: u16,
        start_y: u16,
        end_x: u16,
        end_y: u16,
    ) -> Result<String, ChainError> {
        self.write("composePixels", json!([start_x, start_y, end_x, end_y]))
            .await
    }
}

fn split_batch(pixels: &[(PixelCoord, String)]) -> (Vec<u16>, Vec<u16>, Vec<&str>) {
    let xs = pixels.iter().map(|(p, _)| p.x).collect();
    let ys = pixels.iter().map(|(p, _)| p.y).collect();
    let colors = pixels.iter().map(|(_, c)| c.as_str()).collect();
    (xs, ys, colors)
}

fn expect_str(value: &Value) -> Result<String, ChainError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ChainError::UnexpectedResponse(format!("expected string, got {}", value)))
}

fn expect_u64(value: &Value) -> Result<u64, ChainError> {
    // The gateway serializes uint256 results as JSON numbers or decimal
    // strings depending on magnitude.
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.parse::<u64>() {
            return Ok(n);
        }
    }
    Err(ChainError::UnexpectedResponse(format!(
        "expected unsigned integer, got {}",
        value
    )))
}

fn expect_u64_array(value: &Value) -> Result<Vec<u64>, ChainError> {
    let array = value
        .as_array()
        .ok_or_else(|| ChainError::UnexpectedResponse(format!("expected array, got {}", value)))?;
    array.iter().map(expect_u64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rejection_is_distinguished() {
        let rejected = ChainError::Gateway {
            code: Some(4001),
            message: "User rejected the request".to_string(),
        };
        let reverted = ChainError::Gateway {
            code: Some(3),
            message: "execution reverted: pixel already minted".to_string(),
        };
        assert!(rejected.is_user_rejection());
        assert!(!reverted.is_user_rejection());
    }

    #[test]
    fn u64_values_parse_from_numbers_and_strings() {
        assert_eq!(expect_u64(&serde_json::json!(42)).unwrap(), 42);
        assert_eq!(expect_u64(&serde_json::json!("100001")).unwrap(), 100_001);
        assert!(expect_u64(&serde_json::json!("0xff")).is_err());
    }

    #[test]
    fn multicall_entry_success_requires_status() {
        let ok = MulticallEntry {
            status: "success".to_string(),
            result: Some(serde_json::json!("#ff0000")),
        };
        let failed = MulticallEntry {
            status: "failure".to_string(),
            result: None,
        };
        assert_eq!(ok.success().and_then(|v| v.as_str()), Some("#ff0000"));
        assert!(failed.success().is_none());
    }
}
