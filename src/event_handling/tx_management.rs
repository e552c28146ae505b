use crate::app_state::{App, FallbackOutcome, LookupOutcome, TxUpdate};
use crate::chain_client::ChainError;
use crate::coords::PixelCoord;
use crate::event_handling::validation::{normalize_region, parse_address};
use crate::pending::{OpId, TxKind};
use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;

impl App {
    /// Mint the selected pixel with the selected color.
    pub fn submit_mint(&mut self, coord: PixelCoord) {
        if self.wallet_address.is_none() {
            self.add_status_message("Connect a wallet address first ('w').".to_string());
            return;
        }
        if self.store.read(coord).is_some_and(|r| r.minted) {
            self.add_status_message(format!("Pixel {} is already minted.", coord));
            return;
        }
        if self.pending.is_pending(coord) {
            self.add_status_message(format!("Pixel {} already has a pending operation.", coord));
            return;
        }

        let color = self.selected_color.clone();
        let op = self
            .pending
            .submit(TxKind::Mint, vec![coord], Instant::now());
        let chain = self.chain.clone();
        let (x, y) = (coord.x, coord.y);
        self.spawn_write(op, async move { chain.mint(x, y, &color).await });
        self.add_status_message(format!(
            "Minting pixel {} with {}...",
            coord, self.selected_color
        ));
    }

    /// Recolor a pixel. Owners go straight to the write; for anyone else
    /// the contract's delegation registry is consulted first.
    pub fn submit_update(&mut self, coord: PixelCoord) {
        let Some(wallet) = self.wallet_address.clone() else {
            self.add_status_message("Connect a wallet address first ('w').".to_string());
            return;
        };
        let Some(record) = self.store.read(coord).cloned() else {
            self.add_status_message(format!("Pixel {} is not loaded yet.", coord));
            return;
        };
        if !record.minted {
            self.add_status_message(format!("Pixel {} is not minted; mint it instead.", coord));
            return;
        }
        if self.pending.is_pending(coord) {
            self.add_status_message(format!("Pixel {} already has a pending operation.", coord));
            return;
        }

        let owns_it = record
            .owner
            .as_deref()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(&wallet));
        if owns_it {
            let color = self.selected_color.clone();
            self.submit_update_authorized(coord, color);
            return;
        }

        // Not the owner: maybe a delegate.
        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        let color = self.selected_color.clone();
        self.add_status_message(format!("Checking update rights on {}...", coord));
        tokio::spawn(async move {
            let authorized = chain
                .is_pixel_authorized(coord.x, coord.y, &wallet)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(LookupOutcome::UpdateAuthorization {
                coord,
                color,
                authorized,
            });
        });
    }

    pub fn submit_update_authorized(&mut self, coord: PixelCoord, color: String) {
        let op = self
            .pending
            .submit(TxKind::Update, vec![coord], Instant::now());
        let chain = self.chain.clone();
        let (x, y) = (coord.x, coord.y);
        let write_color = color.clone();
        self.spawn_write(op, async move { chain.update_color(x, y, &write_color).await });
        self.add_status_message(format!("Updating pixel {} to {}...", coord, color));
    }

    /// Submit the draw-mode selection. The minted set within the drawn
    /// bounding box is read from the contract first, so staged pixels are
    /// split into batchMint / batchUpdateColor against chain truth rather
    /// than a possibly stale cache.
    pub fn submit_drawn_batch(&mut self) {
        if self.wallet_address.is_none() {
            self.add_status_message("Connect a wallet address first ('w').".to_string());
            return;
        }
        let mut pixels: Vec<(PixelCoord, String)> = self
            .drawn_pixels
            .iter()
            .filter(|(coord, _)| !self.pending.is_pending(**coord))
            .map(|(coord, color)| (*coord, color.clone()))
            .collect();
        if pixels.is_empty() {
            self.add_status_message(
                "Nothing drawn. Toggle draw mode with 'd' and click pixels.".to_string(),
            );
            return;
        }
        // Deterministic argument order regardless of map iteration.
        pixels.sort_by_key(|(c, _)| *c);
        self.drawn_pixels.clear();
        self.draw_mode = false;

        let min_x = pixels.iter().map(|(c, _)| c.x).min().unwrap_or(0);
        let min_y = pixels.iter().map(|(c, _)| c.y).min().unwrap_or(0);
        let max_x = pixels.iter().map(|(c, _)| c.x).max().unwrap_or(0);
        let max_y = pixels.iter().map(|(c, _)| c.y).max().unwrap_or(0);

        self.add_status_message(format!("Classifying {} drawn pixel(s)...", pixels.len()));
        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            let minted = chain
                .get_minted_pixels_in_range(min_x, min_y, max_x, max_y)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(LookupOutcome::DrawnClassification { pixels, minted });
        });
    }

    /// Continue the drawn-batch submission once the minted set is known.
    /// `minted_ids` is `None` when the range read failed; the local cache
    /// classifies instead.
    pub fn finish_drawn_batch(
        &mut self,
        pixels: Vec<(PixelCoord, String)>,
        minted_ids: Option<HashSet<u64>>,
    ) {
        let Some(wallet) = self.wallet_address.clone() else {
            return;
        };

        let mut mints: Vec<(PixelCoord, String)> = Vec::new();
        let mut updates: Vec<(PixelCoord, String)> = Vec::new();
        let mut skipped = 0usize;
        for (coord, color) in pixels {
            let minted = match &minted_ids {
                Some(ids) => ids.contains(&self.codec.encode(coord)),
                None => self.store.read(coord).is_some_and(|r| r.minted),
            };
            if !minted {
                mints.push((coord, color));
                continue;
            }
            let owned = self.store.read(coord).is_some_and(|r| {
                r.owner
                    .as_deref()
                    .is_some_and(|o| o.eq_ignore_ascii_case(&wallet))
            });
            if owned {
                updates.push((coord, color));
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            self.log_background(format!(
                "Skipped {} drawn pixel(s) owned by someone else.",
                skipped
            ));
        }
        if mints.is_empty() && updates.is_empty() {
            self.add_status_message("Nothing submittable in the drawn selection.".to_string());
            return;
        }

        if !mints.is_empty() {
            let pixels: Vec<PixelCoord> = mints.iter().map(|(c, _)| *c).collect();
            let op = self
                .pending
                .submit(TxKind::BatchMint(pixels.len()), pixels, Instant::now());
            let chain = self.chain.clone();
            let call = mints.clone();
            self.spawn_write(op, async move { chain.batch_mint(&call).await });
            self.add_status_message(format!("Batch minting {} pixels...", mints.len()));
        }
        if !updates.is_empty() {
            let pixels: Vec<PixelCoord> = updates.iter().map(|(c, _)| *c).collect();
            let op = self
                .pending
                .submit(TxKind::BatchUpdate(pixels.len()), pixels, Instant::now());
            let chain = self.chain.clone();
            let call = updates.clone();
            self.spawn_write(op, async move { chain.batch_update_color(&call).await });
            self.add_status_message(format!("Batch updating {} pixels...", updates.len()));
        }
    }

    /// Approve operators on the selection: the single selected pixel, or
    /// every owned pixel of the drawn set. Multiple comma-separated
    /// addresses assign one operator per pixel.
    pub fn submit_delegation(&mut self, operator_input: &str) {
        let operators: Result<Vec<String>, _> = operator_input
            .split(',')
            .map(parse_address)
            .collect();
        let operators = match operators {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => {
                self.add_status_message("Enter at least one operator address.".to_string());
                return;
            }
            Err(e) => {
                self.add_status_message(format!("Delegation rejected: {}", e));
                return;
            }
        };
        let Some(wallet) = self.wallet_address.clone() else {
            self.add_status_message("Connect a wallet address first ('w').".to_string());
            return;
        };

        let mut pixels: Vec<PixelCoord> = if !self.drawn_pixels.is_empty() {
            self.drawn_pixels.keys().copied().collect()
        } else if let Some(coord) = self.selected_pixel {
            vec![coord]
        } else {
            self.add_status_message("Select a pixel (or draw a set) to delegate.".to_string());
            return;
        };
        pixels.retain(|coord| {
            self.store.read(*coord).is_some_and(|r| {
                r.minted
                    && r.owner
                        .as_deref()
                        .is_some_and(|o| o.eq_ignore_ascii_case(&wallet))
            })
        });
        pixels.sort();
        if pixels.is_empty() {
            self.add_status_message("You own none of the selected pixels.".to_string());
            return;
        }
        if operators.len() > 1 && operators.len() != pixels.len() {
            self.add_status_message(format!(
                "Got {} operators for {} pixels; give one address, or one per pixel.",
                operators.len(),
                pixels.len()
            ));
            return;
        }

        let count = pixels.len();
        let op = self
            .pending
            .submit(TxKind::Delegation(count), pixels.clone(), Instant::now());
        let chain = self.chain.clone();
        if operators.len() > 1 {
            let list = operators.clone();
            self.spawn_write(op, async move {
                chain.batch_approve_multiple(&pixels, &list).await
            });
            self.add_status_message(format!(
                "Delegating {} pixels to {} operators...",
                count,
                operators.len()
            ));
        } else {
            let operator = operators.into_iter().next().unwrap_or_default();
            let short = Self::short_address(&operator);
            if count == 1 {
                let coord = pixels[0];
                self.spawn_write(op, async move {
                    chain.approve_pixel(coord.x, coord.y, &operator).await
                });
                self.add_status_message(format!("Delegating {} to {}...", coord, short));
            } else {
                self.spawn_write(op, async move { chain.batch_approve(&pixels, &operator).await });
                self.add_status_message(format!("Delegating {} pixels to {}...", count, short));
            }
        }
    }

    /// Compose the rectangle between the compose anchor and a second
    /// corner. Ownership of the full region is verified against the
    /// contract before asking for a signature.
    pub fn submit_compose(&mut self, corner: PixelCoord) {
        let Some(anchor) = self.compose_anchor.take() else {
            self.add_status_message("Pick a compose anchor first ('o').".to_string());
            return;
        };
        let Some(wallet) = self.wallet_address.clone() else {
            self.add_status_message("Connect a wallet address first ('w').".to_string());
            return;
        };
        let (min, max) = match normalize_region(anchor, corner) {
            Ok(region) => region,
            Err(e) => {
                self.add_status_message(format!("Compose rejected: {}", e));
                return;
            }
        };

        self.add_status_message(format!(
            "Checking ownership of region {} to {}...",
            min, max
        ));
        let chain = self.chain.clone();
        let tx = self.lookup_tx.clone();
        tokio::spawn(async move {
            let owned = chain
                .get_owned_pixels_in_area(min.x, min.y, max.x, max.y, &wallet)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(LookupOutcome::ComposeOwnership { min, max, owned });
        });
    }

    /// Continue composition once the owned-token list for the region came
    /// back: the write only goes out if every pixel in the rectangle is
    /// ours.
    pub fn finish_compose(&mut self, min: PixelCoord, max: PixelCoord, owned_ids: Vec<u64>) {
        let region_size = (max.x - min.x + 1) as usize * (max.y - min.y + 1) as usize;
        if owned_ids.len() != region_size {
            self.add_status_message(format!(
                "Compose rejected: you own {} of {} pixels in the region.",
                owned_ids.len(),
                region_size
            ));
            return;
        }

        let mut pixels = Vec::with_capacity(region_size);
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                pixels.push(PixelCoord::new(x, y));
            }
        }

        let op = self
            .pending
            .submit(TxKind::Compose(region_size), pixels, Instant::now());
        let chain = self.chain.clone();
        self.spawn_write(op, async move {
            chain.compose_pixels(min.x, min.y, max.x, max.y).await
        });
        self.add_status_message(format!(
            "Composing {} pixels ({} to {})...",
            region_size, min, max
        ));
    }

    /// Run a contract write plus its receipt wait in the background,
    /// reporting progress on the tx channel.
    fn spawn_write<F>(&self, op: OpId, write: F)
    where
        F: Future<Output = Result<String, ChainError>> + Send + 'static,
    {
        let chain = self.chain.clone();
        let tx = self.tx_tx.clone();
        tokio::spawn(async move {
            match write.await {
                Ok(hash) => {
                    let _ = tx.send(TxUpdate::Submitted {
                        op,
                        hash: hash.clone(),
                    });
                    match chain.wait_for_receipt(&hash).await {
                        Ok(receipt) if receipt.status == "success" => {
                            let _ = tx.send(TxUpdate::ReceiptConfirmed { op });
                        }
                        Ok(receipt) => {
                            let _ = tx.send(TxUpdate::ReceiptFailed {
                                op,
                                reason: receipt
                                    .reason
                                    .unwrap_or_else(|| "transaction reverted".to_string()),
                            });
                        }
                        Err(e) => {
                            let _ = tx.send(TxUpdate::ReceiptFailed {
                                op,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(TxUpdate::WriteFailed {
                        op,
                        user_rejected: e.is_user_rejection(),
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    pub fn handle_tx_update(&mut self, update: TxUpdate) {
        match update {
            TxUpdate::Submitted { op, hash } => {
                self.pending.attach_hash(op, hash.clone());
                self.log_background(format!("Transaction submitted: {}", hash));
            }
            TxUpdate::WriteFailed {
                op,
                reason,
                user_rejected,
            } => {
                let rolled_back = self.pending.rollback(op);
                let label = rolled_back
                    .map(|o| o.kind.label())
                    .unwrap_or("transaction");
                if user_rejected {
                    self.add_status_message(format!(
                        "{} cancelled: rejected in wallet.",
                        capitalize(label)
                    ));
                } else {
                    self.add_status_message(format!("{} failed: {}", capitalize(label), reason));
                }
            }
            TxUpdate::ReceiptConfirmed { op } => {
                let deadline = Instant::now() + self.config.fallback_delay;
                if let Some(kind) = self.pending.arm_fallback(op, deadline) {
                    self.add_status_message(kind.success_message());
                }
                // If the op is already gone, events beat the receipt; the
                // store is up to date and there is nothing left to arm.
            }
            TxUpdate::ReceiptFailed { op, reason } => {
                let rolled_back = self.pending.rollback(op);
                let label = rolled_back
                    .map(|o| o.kind.label())
                    .unwrap_or("transaction");
                self.add_status_message(format!("{} failed: {}", capitalize(label), reason));
            }
        }
    }

    /// Fire any fallback whose deadline passed without event coverage:
    /// re-read the affected pixels straight from the contract so the UI
    /// converges even with a dead event subscription.
    pub fn tick_fallbacks(&mut self, now: Instant) {
        for op in self.pending.due_fallbacks(now) {
            let chain = self.chain.clone();
            let tx = self.fallback_tx.clone();
            let codec = self.codec;
            let label = op.kind.label();
            let pixels: Vec<(PixelCoord, u64)> = op
                .pixels
                .iter()
                .map(|coord| (*coord, codec.encode(*coord)))
                .collect();
            self.log_background(format!(
                "No event for {} within {}ms; re-fetching {} pixel(s).",
                label,
                self.config.fallback_delay.as_millis(),
                pixels.len()
            ));
            tokio::spawn(async move {
                let outcome = match chain.fetch_pixels(&pixels).await {
                    Ok(results) => FallbackOutcome::Applied { label, results },
                    Err(e) => FallbackOutcome::Failed {
                        label,
                        error: e.to_string(),
                    },
                };
                let _ = tx.send(outcome);
            });
        }
    }

    pub fn handle_fallback_outcome(&mut self, outcome: FallbackOutcome) {
        match outcome {
            FallbackOutcome::Applied { label, results } => {
                let mut applied = 0;
                for (coord, result) in results {
                    if let Some((owner, color)) = result {
                        self.store.apply_event(coord, color, owner);
                        applied += 1;
                    }
                }
                self.log_background(format!(
                    "Fallback reconciled {} pixel(s) after {}.",
                    applied, label
                ));
                self.trigger_total_minted_fetch();
            }
            FallbackOutcome::Failed { label, error } => {
                // Pending was already cleared when the fallback fired; the
                // display may be stale until the next refresh.
                self.log_background(format!(
                    "Fallback re-fetch after {} failed: {}",
                    label, error
                ));
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
