use crate::chain_client::{ChainClient, CompositionInfo};
use crate::config::{CanvasConfig, SettingsData, SettingsStorage};
use crate::coords::{ChunkId, Codec, PixelCoord};
use crate::gallery::{GalleryCache, GalleryClient, GalleryFilter, GalleryToken};
use crate::metadata::TokenMetadata;
use crate::pending::{OpId, PendingTracker};
use crate::pixel_store::{ChunkPixelResult, PixelStore};
use crate::scheduler::RequestScheduler;
use crate::viewport::ViewportController;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tokio::sync::mpsc;

/// Predefined palette, same swatches as the web canvas.
pub const COLOR_PALETTE: [&str; 16] = [
    "#ffffff", "#e4e4e4", "#888888", "#222222", "#ffa7d1", "#e50000", "#e59500", "#a06a42",
    "#e5d900", "#94e044", "#02be01", "#00d3dd", "#0083c7", "#0000ea", "#cf6ee4", "#820080",
];

#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub enum InputMode {
    #[default]
    None,
    EnterGatewayUrl,
    EnterWalletAddress,
    EnterPosition,
    EnterHexColor,
    EnterDelegate,
    ComposeSelect,
    ShowHelp,
    ShowStatusLog,
    ShowMetadata,
    ShowGallery,
}

/// Result of one background chunk fetch.
#[derive(Debug)]
pub enum ChunkFetchOutcome {
    Loaded {
        chunk: ChunkId,
        results: Vec<ChunkPixelResult>,
    },
    Failed {
        chunk: ChunkId,
        error: String,
    },
}

/// Progress reports from a transaction task: write submission, then the
/// receipt wait.
#[derive(Debug)]
pub enum TxUpdate {
    Submitted {
        op: OpId,
        hash: String,
    },
    WriteFailed {
        op: OpId,
        reason: String,
        user_rejected: bool,
    },
    ReceiptConfirmed {
        op: OpId,
    },
    ReceiptFailed {
        op: OpId,
        reason: String,
    },
}

/// Decoded chain events from the listener task.
#[derive(Debug)]
pub enum ChainEventUpdate {
    Minted {
        coord: PixelCoord,
        owner: String,
        /// Fetched by the listener right after the transfer; `None` when
        /// that read failed (renders as the default color until re-fetch).
        color: Option<String>,
    },
    ColorUpdated {
        coord: PixelCoord,
        color: String,
        owner: String,
    },
    ListenerFailed {
        error: String,
    },
}

/// Results of one fired fallback re-fetch.
#[derive(Debug)]
pub enum FallbackOutcome {
    Applied {
        label: &'static str,
        results: Vec<ChunkPixelResult>,
    },
    Failed {
        label: &'static str,
        error: String,
    },
}

/// Slow-path lookups that feed popups and counters.
#[derive(Debug)]
pub enum LookupOutcome {
    TotalMinted(u64),
    Metadata {
        token_id: u64,
        result: Result<(TokenMetadata, Option<CompositionInfo>), String>,
    },
    Gallery {
        cache_key: String,
        result: Result<Vec<GalleryToken>, String>,
    },
    /// Delegated-authority check before an update on a pixel the wallet
    /// does not own.
    UpdateAuthorization {
        coord: PixelCoord,
        color: String,
        authorized: Result<bool, String>,
    },
    /// Minted token ids inside the drawn selection's bounding box,
    /// splitting a staged batch into mints vs updates.
    DrawnClassification {
        pixels: Vec<(PixelCoord, String)>,
        minted: Result<Vec<u64>, String>,
    },
    /// Token ids the wallet owns inside a candidate compose region.
    ComposeOwnership {
        min: PixelCoord,
        max: PixelCoord,
        owned: Result<Vec<u64>, String>,
    },
    /// Collection-level metadata from `contractURI`.
    ContractInfo {
        name: String,
    },
}

#[derive(Debug)]
pub enum ListenerControl {
    Stop,
}

#[derive(Debug)]
pub struct StatusEntry {
    pub at: Instant,
    pub stamp: String,
    pub text: String,
}

#[derive(Debug)]
pub struct MetadataView {
    pub token_id: u64,
    pub metadata: TokenMetadata,
    pub composition: Option<CompositionInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryScope {
    Collection,
    Mine,
}

#[derive(Debug)]
pub struct GalleryView {
    pub scope: GalleryScope,
    pub filter: GalleryFilter,
    pub tokens: Vec<GalleryToken>,
    pub selection: usize,
    pub loading: bool,
}

impl Default for GalleryView {
    fn default() -> Self {
        Self {
            scope: GalleryScope::Collection,
            filter: GalleryFilter::Pixels,
            tokens: Vec::new(),
            selection: 0,
            loading: false,
        }
    }
}

#[derive(Debug)]
pub struct App {
    pub exit: bool,
    pub config: CanvasConfig,
    pub codec: Codec,
    pub chain: ChainClient,
    pub gallery_client: GalleryClient,
    pub settings_storage: SettingsStorage,
    pub settings: SettingsData,
    pub wallet_address: Option<String>,

    pub input_mode: InputMode,
    pub input_buffer: String,
    pub status_message: String,
    pub status_messages: VecDeque<StatusEntry>,

    // Core canvas state.
    pub store: PixelStore,
    pub scheduler: RequestScheduler,
    pub pending: PendingTracker,
    pub viewport: ViewportController,

    pub selected_pixel: Option<PixelCoord>,
    pub selected_color: String,
    pub palette_index: usize,

    pub draw_mode: bool,
    pub drawn_pixels: HashMap<PixelCoord, String>,
    pub compose_anchor: Option<PixelCoord>,

    pub total_minted: u64,
    pub collection_name: Option<String>,
    pub initial_load_done: bool,

    // Event listener lifecycle. Watching starts a beat after the first
    // load so the initial chunk wave doesn't race the subscription.
    pub events_enabled: bool,
    pub event_enable_at: Option<Instant>,
    pub listener_control: Option<mpsc::UnboundedSender<ListenerControl>>,

    // Background-task channels, drained with try_recv each tick.
    pub chunk_tx: mpsc::UnboundedSender<ChunkFetchOutcome>,
    pub chunk_rx: mpsc::UnboundedReceiver<ChunkFetchOutcome>,
    pub tx_tx: mpsc::UnboundedSender<TxUpdate>,
    pub tx_rx: mpsc::UnboundedReceiver<TxUpdate>,
    pub event_tx: mpsc::UnboundedSender<ChainEventUpdate>,
    pub event_rx: mpsc::UnboundedReceiver<ChainEventUpdate>,
    pub fallback_tx: mpsc::UnboundedSender<FallbackOutcome>,
    pub fallback_rx: mpsc::UnboundedReceiver<FallbackOutcome>,
    pub lookup_tx: mpsc::UnboundedSender<LookupOutcome>,
    pub lookup_rx: mpsc::UnboundedReceiver<LookupOutcome>,

    // Popup data.
    pub metadata_view: Option<MetadataView>,
    pub metadata_loading: bool,
    pub gallery_view: GalleryView,
    pub gallery_cache: GalleryCache,

    // Inner board rect from the last render, for mouse mapping.
    pub board_area_bounds: Option<(u16, u16, u16, u16)>,
}
