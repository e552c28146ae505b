use crate::app_state::{App, ChunkFetchOutcome, LookupOutcome};
use crate::chunks::{self, ChunkDescriptor};
use crate::coords::PixelCoord;
use crate::viewport::Viewport;
use std::time::Instant;

impl App {
    /// The viewport has been stable for the debounce window: queue the
    /// chunks it needs and drop cache entries that drifted out of range.
    pub fn handle_viewport_settle(&mut self, viewport: Viewport) {
        let required = chunks::required_chunks(&self.config, viewport, self.config.prefetch_buffer);
        let store = &self.store;
        self.scheduler
            .schedule(&required, |id| store.is_chunk_loaded(id));
        self.drain_scheduler();

        // Eviction runs on every settle, independent of fetch activity.
        let center = self.codec.chunk_of(
            PixelCoord::new(viewport.x, viewport.y),
            self.config.chunk_size,
        );
        let removed = self.store.evict_beyond(
            &self.codec,
            self.config.chunk_size,
            center,
            self.config.cleanup_distance,
        );
        if removed > 0 {
            self.log_background(format!("Evicted {} out-of-range chunk(s)", removed));
        }
    }

    /// Spawn fetch tasks for as many queued chunks as the concurrency
    /// limit allows, staggered to keep the RPC endpoint breathing.
    pub fn drain_scheduler(&mut self) {
        let batch = self.scheduler.next_batch();
        for (position, descriptor) in batch.into_iter().enumerate() {
            self.spawn_chunk_fetch(descriptor, position);
        }
    }

    fn spawn_chunk_fetch(&self, descriptor: ChunkDescriptor, position: usize) {
        let chain = self.chain.clone();
        let tx = self.chunk_tx.clone();
        let spacing = self.config.request_spacing;
        let codec = self.codec;
        let pixels: Vec<(PixelCoord, u64)> = chunks::chunk_pixels(&self.config, descriptor.id)
            .into_iter()
            .map(|coord| (coord, codec.encode(coord)))
            .collect();

        tokio::spawn(async move {
            if position > 0 {
                tokio::time::sleep(spacing * position as u32).await;
            }
            let outcome = match chain.fetch_chunk(&pixels).await {
                Ok(results) => ChunkFetchOutcome::Loaded {
                    chunk: descriptor.id,
                    results,
                },
                Err(e) => ChunkFetchOutcome::Failed {
                    chunk: descriptor.id,
                    error: e.to_string(),
                },
            };
            // Send fails only if the app has shut down.
            let _ = tx.send(outcome);
        });
    }

    /// Merge a completed fetch and keep the queue moving. A failed chunk
    /// releases its slot without being marked loaded, so the next settle
    /// re-queues it; nothing else stops.
    pub fn handle_chunk_outcome(&mut self, outcome: ChunkFetchOutcome) {
        match outcome {
            ChunkFetchOutcome::Loaded { chunk, results } => {
                self.scheduler.complete(chunk);
                self.store.merge_chunk(chunk, results);
            }
            ChunkFetchOutcome::Failed { chunk, error } => {
                self.scheduler.complete(chunk);
                self.log_background(format!("Chunk {} fetch failed: {}", chunk, error));
            }
        }

        if self.scheduler.is_idle() && !self.initial_load_done {
            self.initial_load_done = true;
            // Event watching waits out a short delay so it cannot race the
            // initial bulk fetch.
            self.event_enable_at = Some(Instant::now() + self.config.event_enable_delay);
            self.add_status_message(format!(
                "Initial viewport loaded ({} chunks cached).",
                self.store.loaded_chunk_count()
            ));
        }

        self.drain_scheduler();
    }

    /// Forget what is loaded and re-request the current viewport. Keeps
    /// rendered pixels on screen until fresh data lands.
    pub fn refresh_board(&mut self) {
        self.store.invalidate_chunks();
        self.scheduler.clear_queue();
        self.gallery_cache.clear();
        self.viewport.force_settle();
        self.trigger_total_minted_fetch();
        if !self.events_enabled && self.initial_load_done {
            // A dead listener comes back on manual refresh.
            self.event_enable_at = Some(Instant::now());
        }
        self.add_status_message("Refreshing viewport from chain...".to_string());
    }

    pub fn trigger_total_minted_fetch(&self) {
        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            if let Ok(total) = chain.total_minted().await {
                let _ = tx.send(LookupOutcome::TotalMinted(total));
            }
        });
    }
}
