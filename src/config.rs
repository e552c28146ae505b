use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime constants for the canvas client. Grid dimensions vary by
/// deployment (10x10 and 100x100 contracts exist for the same family), so
/// they are configuration, never hardcoded in any module.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub width: u16,
    pub height: u16,
    pub chunk_size: u16,
    pub min_viewport_size: u16,
    pub max_viewport_size: u16,
    pub zoom_step: u16,
    /// Extra margin (in pixels) loaded around the viewport.
    pub prefetch_buffer: u16,
    /// Maximum chunk fetches in flight at once.
    pub max_concurrent_requests: usize,
    /// Stagger between fetches in one drained batch.
    pub request_spacing: Duration,
    /// Viewport changes settle after this long without further movement.
    pub viewport_debounce: Duration,
    /// Receipt-confirmed operations fall back to a manual re-fetch after
    /// this long without a matching chain event.
    pub fallback_delay: Duration,
    /// Chunks farther than this (Chebyshev, in chunks) from the viewport
    /// chunk are evicted on settle.
    pub cleanup_distance: u16,
    /// Event polling starts this long after the initial load.
    pub event_enable_delay: Duration,
    pub event_poll_interval: Duration,
    pub highlight_duration: Duration,
    pub gallery_cache_ttl: Duration,
    /// Screen cells of drag required before the viewport moves.
    pub pan_threshold: u16,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            chunk_size: 5,
            min_viewport_size: 10,
            max_viewport_size: 100,
            zoom_step: 5,
            prefetch_buffer: 5,
            max_concurrent_requests: 3,
            request_spacing: Duration::from_millis(50),
            viewport_debounce: Duration::from_millis(300),
            fallback_delay: Duration::from_millis(2000),
            cleanup_distance: 3,
            event_enable_delay: Duration::from_secs(2),
            event_poll_interval: Duration::from_secs(2),
            highlight_duration: Duration::from_secs(3),
            gallery_cache_ttl: Duration::from_secs(60),
            pan_threshold: 2,
        }
    }
}

impl CanvasConfig {
    pub fn with_grid(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self.max_viewport_size = self.max_viewport_size.min(width).min(height);
        self.min_viewport_size = self.min_viewport_size.min(self.max_viewport_size);
        self
    }
}

/// Connection settings persisted between sessions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SettingsData {
    pub gateway_url: Option<String>,
    pub wallet_address: Option<String>,
    pub contract_address: Option<String>,
    pub indexer_url: Option<String>,
    pub indexer_api_key: Option<String>,
    pub grid_width: Option<u16>,
    pub grid_height: Option<u16>,
}

#[derive(Debug)]
pub struct SettingsStorage {
    file_path: PathBuf,
}

impl SettingsStorage {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let home_dir = dirs::home_dir().ok_or("Could not find home directory")?;
        let file_path = home_dir.join(".pxnft_tui.json");

        Ok(Self { file_path })
    }

    pub fn load(&self) -> SettingsData {
        match self.try_load() {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Could not load saved settings: {}. Starting fresh.", e);
                SettingsData::default()
            }
        }
    }

    fn try_load(&self) -> Result<SettingsData, Box<dyn std::error::Error>> {
        if !self.file_path.exists() {
            return Ok(SettingsData::default());
        }

        let content = fs::read_to_string(&self.file_path)?;
        let data: SettingsData = serde_json::from_str(&content)?;
        Ok(data)
    }

    pub fn save(&self, data: &SettingsData) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.file_path, json)?;

        // Settings may hold an API key; owner-only permissions.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.file_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.file_path, perms)?;
        }

        Ok(())
    }

    pub fn clear(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_override_clamps_viewport_bounds() {
        let config = CanvasConfig::default().with_grid(10, 10);
        assert_eq!(config.width, 10);
        assert_eq!(config.max_viewport_size, 10);
        assert!(config.min_viewport_size <= config.max_viewport_size);
    }

    #[test]
    fn settings_roundtrip_json() {
        let data = SettingsData {
            gateway_url: Some("http://localhost:8545".to_string()),
            wallet_address: Some("0xabc".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&data).unwrap();
        let back: SettingsData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gateway_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(back.contract_address, None);
    }
}
