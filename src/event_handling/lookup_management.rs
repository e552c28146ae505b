use crate::app_state::{App, GalleryScope, InputMode, LookupOutcome, MetadataView};
use crate::coords::Codec;
use crate::gallery::GalleryCache;
use crate::metadata::decode_token_uri;
use std::collections::HashSet;
use std::time::Instant;

impl App {
    /// 't': open the metadata viewer for the selected pixel's token.
    pub fn open_metadata_for_selection(&mut self) {
        let Some(coord) = self.selected_pixel else {
            self.status_message = "Click a pixel first.".to_string();
            return;
        };
        if !self.store.read(coord).is_some_and(|r| r.minted) {
            self.status_message = format!("Pixel {} has no token yet.", coord);
            return;
        }
        let token_id = self.codec.encode(coord);
        self.trigger_metadata_fetch(token_id);
    }

    /// Fetch and decode `tokenURI`; composite tokens also pull their
    /// composition bounds.
    pub fn trigger_metadata_fetch(&mut self, token_id: u64) {
        self.metadata_loading = true;
        self.metadata_view = None;
        self.input_mode = InputMode::ShowMetadata;

        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            let result = async {
                let uri = chain.token_uri(token_id).await.map_err(|e| e.to_string())?;
                let metadata = decode_token_uri(&uri).map_err(|e| e.to_string())?;
                let composition = if Codec::is_composite(token_id) {
                    chain.get_composition_info(token_id).await.ok()
                } else {
                    None
                };
                Ok((metadata, composition))
            }
            .await;
            let _ = tx.send(LookupOutcome::Metadata { token_id, result });
        });
    }

    pub fn open_gallery(&mut self) {
        self.input_mode = InputMode::ShowGallery;
        self.trigger_gallery_fetch();
    }

    pub fn trigger_gallery_fetch(&mut self) {
        self.gallery_view.selection = 0;
        let filter = self.gallery_view.filter;
        let user = match self.gallery_view.scope {
            GalleryScope::Collection => None,
            GalleryScope::Mine => match self.wallet_address.clone() {
                Some(address) => Some(address),
                None => {
                    self.status_message =
                        "Connect a wallet address to browse your tokens.".to_string();
                    self.gallery_view.scope = GalleryScope::Collection;
                    None
                }
            },
        };

        let scope_name = if user.is_some() { "user" } else { "minted" };
        let cache_key = GalleryCache::key(scope_name, user.as_deref(), filter);
        if let Some(tokens) =
            self.gallery_cache
                .get(&cache_key, Instant::now(), self.config.gallery_cache_ttl)
        {
            self.gallery_view.tokens = tokens.to_vec();
            self.gallery_view.loading = false;
            return;
        }

        self.gallery_view.loading = true;
        let gallery = self.gallery_client.clone();
        let chain = self.chain.clone();
        let codec = self.codec;
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            let result = async {
                let mut tokens = match &user {
                    Some(address) => gallery.fetch_user(address, filter, 50, codec).await,
                    None => gallery.fetch_collection(filter, 50, codec).await,
                }
                .map_err(|e| e.to_string())?;

                // The indexer lags color changes; overlay fresh images
                // straight from the contract.
                let ids: Vec<u64> = tokens.iter().map(|t| t.token_id).collect();
                if !ids.is_empty() {
                    if let Ok((images, exists)) = chain.get_batch_token_images(&ids).await {
                        for (i, token) in tokens.iter_mut().enumerate() {
                            if exists.get(i).copied().unwrap_or(false) {
                                if let Some(image) = images.get(i).filter(|s| !s.is_empty()) {
                                    token.image = image.clone();
                                }
                            }
                        }
                    }
                }
                Ok(tokens)
            }
            .await;
            let _ = tx.send(LookupOutcome::Gallery { cache_key, result });
        });
    }

    pub fn handle_lookup_outcome(&mut self, outcome: LookupOutcome) {
        match outcome {
            LookupOutcome::TotalMinted(total) => {
                self.total_minted = total;
            }
            LookupOutcome::Metadata { token_id, result } => {
                self.metadata_loading = false;
                match result {
                    Ok((metadata, composition)) => {
                        self.metadata_view = Some(MetadataView {
                            token_id,
                            metadata,
                            composition,
                        });
                    }
                    Err(e) => {
                        if self.input_mode == InputMode::ShowMetadata {
                            self.input_mode = InputMode::None;
                        }
                        self.add_status_message(format!(
                            "Token {} metadata unavailable: {}",
                            token_id, e
                        ));
                    }
                }
            }
            LookupOutcome::Gallery { cache_key, result } => {
                self.gallery_view.loading = false;
                match result {
                    Ok(tokens) => {
                        self.gallery_cache
                            .put(cache_key, tokens.clone(), Instant::now());
                        self.gallery_view.tokens = tokens;
                    }
                    Err(e) => {
                        // Best-effort source: an empty gallery, not an error
                        // screen.
                        self.gallery_view.tokens = Vec::new();
                        self.log_background(format!("Gallery fetch failed: {}", e));
                    }
                }
            }
            LookupOutcome::UpdateAuthorization {
                coord,
                color,
                authorized,
            } => match authorized {
                Ok(true) => self.submit_update_authorized(coord, color),
                Ok(false) => {
                    self.add_status_message(format!(
                        "You don't own pixel {} and aren't delegated to update it.",
                        coord
                    ));
                }
                Err(e) => {
                    self.add_status_message(format!(
                        "Could not verify update rights on {}: {}",
                        coord, e
                    ));
                }
            },
            LookupOutcome::DrawnClassification { pixels, minted } => match minted {
                Ok(ids) => {
                    let ids: HashSet<u64> = ids.into_iter().collect();
                    self.finish_drawn_batch(pixels, Some(ids));
                }
                Err(e) => {
                    // The cache still knows enough to classify; the
                    // contract rejects anything it disagrees with.
                    self.log_background(format!(
                        "Minted-range read failed ({}); classifying from cache.",
                        e
                    ));
                    self.finish_drawn_batch(pixels, None);
                }
            },
            LookupOutcome::ComposeOwnership { min, max, owned } => match owned {
                Ok(ids) => self.finish_compose(min, max, ids),
                Err(e) => {
                    self.add_status_message(format!(
                        "Could not verify region ownership: {}",
                        e
                    ));
                }
            },
            LookupOutcome::ContractInfo { name } => {
                self.collection_name = Some(name);
            }
        }
    }

    /// Collection name from `contractURI`, shown in the header once known.
    pub fn trigger_contract_info_fetch(&self) {
        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            let Ok(uri) = chain.contract_uri().await else {
                return;
            };
            if let Ok(metadata) = decode_token_uri(&uri) {
                let _ = tx.send(LookupOutcome::ContractInfo {
                    name: metadata.name,
                });
            }
        });
    }
}
