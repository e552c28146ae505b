use crate::app_state::{App, StatusEntry};
use std::time::{Duration, Instant};

impl App {
    /// Add a new status message to the history and update the main status.
    pub fn add_status_message(&mut self, message: String) {
        self.push_status_entry(message.clone());
        self.status_message = message;
    }

    /// Record a background event in the history without stealing the main
    /// status line (chunk failures, listener degradation).
    pub fn log_background(&mut self, message: String) {
        self.push_status_entry(message);
    }

    fn push_status_entry(&mut self, text: String) {
        self.status_messages.push_back(StatusEntry {
            at: Instant::now(),
            stamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            text,
        });

        // Keep only recent history.
        while self.status_messages.len() > 50 {
            self.status_messages.pop_front();
        }
    }

    /// Drop status entries older than 30 seconds from the inline view.
    /// The log popup keeps everything still buffered.
    pub fn cleanup_old_status_messages(&mut self) {
        let cutoff = Instant::now() - Duration::from_secs(30);
        while let Some(entry) = self.status_messages.front() {
            if entry.at < cutoff && self.status_messages.len() > 5 {
                self.status_messages.pop_front();
            } else {
                break;
            }
        }
    }

    /// One-line fetch/cache progress summary for the status area.
    pub fn progress_line(&self) -> String {
        format!(
            "Chunks: {} queued, {} in flight, {} loaded | Pixels cached: {} | Total minted: {}",
            self.scheduler.queue_depth(),
            self.scheduler.in_flight_count(),
            self.store.loaded_chunk_count(),
            self.store.pixel_count(),
            self.total_minted
        )
    }

    pub fn save_settings(&mut self) {
        if let Err(e) = self.settings_storage.save(&self.settings) {
            eprintln!("Warning: Could not save settings: {}", e);
        }
    }

    /// Zoom percentage for the header: 100% = fully zoomed in.
    pub fn zoom_percentage(&self) -> u16 {
        let min = self.config.min_viewport_size;
        let max = self.config.max_viewport_size;
        if max == min {
            return 100;
        }
        let size = self.viewport.viewport().size.clamp(min, max);
        ((max - size) as u32 * 100 / (max - min) as u32) as u16
    }

    pub fn short_address(address: &str) -> String {
        if address.len() > 10 {
            format!("{}..{}", &address[..6], &address[address.len() - 4..])
        } else {
            address.to_string()
        }
    }
}
