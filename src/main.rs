use std::collections::{HashMap, VecDeque};
use std::io::{self, stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;

mod app_state;
mod chain_client;
mod chunks;
mod config;
mod coords;
mod event_handling;
mod gallery;
mod metadata;
mod pending;
mod pixel_store;
mod scheduler;
mod ui;
mod viewport;

use app_state::{App, GalleryView, InputMode, COLOR_PALETTE};
use chain_client::ChainClient;
use config::{CanvasConfig, SettingsStorage};
use coords::Codec;
use gallery::{GalleryCache, GalleryClient};
use pending::PendingTracker;
use pixel_store::PixelStore;
use scheduler::RequestScheduler;
use viewport::ViewportController;

const DEFAULT_INDEXER_URL: &str = "https://api-mainnet.magiceden.dev/v3/rtp/monad-testnet";

impl App {
    pub fn new() -> Self {
        let settings_storage = match SettingsStorage::new() {
            Ok(storage) => storage,
            Err(e) => {
                eprintln!("Warning: Could not initialize settings storage: {}", e);
                SettingsStorage::new().unwrap_or_else(|_| panic!("Failed to create settings storage"))
            }
        };

        let settings = settings_storage.load();

        let config = match (settings.grid_width, settings.grid_height) {
            (Some(w), Some(h)) => CanvasConfig::default().with_grid(w, h),
            _ => CanvasConfig::default(),
        };
        let codec = Codec::new(config.width, config.height);

        let gateway_url = settings
            .gateway_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8787".to_string());
        let chain = ChainClient::new(gateway_url);

        let gallery_client = GalleryClient::new(
            settings
                .indexer_url
                .clone()
                .unwrap_or_else(|| DEFAULT_INDEXER_URL.to_string()),
            settings.indexer_api_key.clone(),
            settings.contract_address.clone().unwrap_or_default(),
        );

        // Restored sessions go straight to the canvas; fresh installs are
        // asked for a gateway URL first.
        let (initial_mode, initial_message) = if settings.gateway_url.is_some() {
            (
                InputMode::None,
                format!(
                    "Restored session: {}. Loading viewport...",
                    settings.gateway_url.as_deref().unwrap_or("unknown gateway")
                ),
            )
        } else {
            (
                InputMode::EnterGatewayUrl,
                "Enter wallet gateway URL (e.g. http://localhost:8787):".to_string(),
            )
        };

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (tx_tx, tx_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (fallback_tx, fallback_rx) = mpsc::unbounded_channel();
        let (lookup_tx, lookup_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            exit: false,
            codec,
            chain,
            gallery_client,
            settings_storage,
            wallet_address: settings.wallet_address.clone(),
            settings,
            input_mode: initial_mode,
            input_buffer: String::new(),
            status_message: initial_message.clone(),
            status_messages: VecDeque::new(),
            store: PixelStore::new(),
            scheduler: RequestScheduler::new(config.max_concurrent_requests),
            pending: PendingTracker::new(),
            viewport: ViewportController::new(&config),
            selected_pixel: None,
            selected_color: "#ff0000".to_string(),
            palette_index: COLOR_PALETTE
                .iter()
                .position(|c| *c == "#e50000")
                .unwrap_or(0),
            draw_mode: false,
            drawn_pixels: HashMap::new(),
            compose_anchor: None,
            total_minted: 0,
            collection_name: None,
            initial_load_done: false,
            events_enabled: false,
            event_enable_at: None,
            listener_control: None,
            chunk_tx,
            chunk_rx,
            tx_tx,
            tx_rx,
            event_tx,
            event_rx,
            fallback_tx,
            fallback_rx,
            lookup_tx,
            lookup_rx,
            metadata_view: None,
            metadata_loading: false,
            gallery_view: GalleryView::default(),
            gallery_cache: GalleryCache::default(),
            board_area_bounds: None,
            config,
        };

        if app.input_mode == InputMode::None {
            app.add_status_message(initial_message);
            app.viewport.force_settle();
            app.trigger_total_minted_fetch();
            app.trigger_contract_info_fetch();
        }

        app
    }

    pub async fn run(&mut self, terminal: &mut Terminal<impl Backend>) -> io::Result<()> {
        while !self.exit {
            terminal.draw(|frame| ui::render_ui(self, frame))?;
            self.handle_events().await?;
        }

        self.stop_event_listener();

        Ok(())
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let mut app = App::new();
    let res = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture)?;

    res
}
