use crate::app_state::{App, ChainEventUpdate, ListenerControl};
use crate::chain_client::{ChainClient, LogEntry, ZERO_ADDRESS};
use crate::coords::Codec;
use crate::pixel_store::DEFAULT_COLOR;
use std::time::Instant;
use tokio::sync::mpsc;

impl App {
    /// Start watching chain events once the post-load delay has passed.
    pub fn maybe_start_event_listener(&mut self, now: Instant) {
        if self.events_enabled {
            return;
        }
        let Some(enable_at) = self.event_enable_at else {
            return;
        };
        if now < enable_at {
            return;
        }
        self.event_enable_at = None;
        self.start_event_listener();
    }

    fn start_event_listener(&mut self) {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ListenerControl>();
        self.listener_control = Some(control_tx);
        self.events_enabled = true;
        self.log_background("Event watching enabled.".to_string());

        let chain = self.chain.clone();
        let tx = self.event_tx.clone();
        let codec = self.codec;
        let poll_interval = self.config.event_poll_interval;

        tokio::spawn(async move {
            // A fromBlock of 0 asks the gateway to bootstrap the cursor at
            // the current head without replaying history.
            let mut transfer_cursor = 0u64;
            let mut color_cursor = 0u64;

            loop {
                tokio::time::sleep(poll_interval).await;
                if let Ok(ListenerControl::Stop) = control_rx.try_recv() {
                    return;
                }

                let transfers = match chain.logs("Transfer", transfer_cursor).await {
                    Ok(response) => response,
                    Err(e) => {
                        let _ = tx.send(ChainEventUpdate::ListenerFailed {
                            error: e.to_string(),
                        });
                        return;
                    }
                };
                transfer_cursor = transfers.next_block;
                for log in &transfers.logs {
                    if let Some(update) = decode_mint(&chain, codec, log).await {
                        let _ = tx.send(update);
                    }
                }

                let colors = match chain.logs("ColorUpdated", color_cursor).await {
                    Ok(response) => response,
                    Err(e) => {
                        let _ = tx.send(ChainEventUpdate::ListenerFailed {
                            error: e.to_string(),
                        });
                        return;
                    }
                };
                color_cursor = colors.next_block;
                for log in &colors.logs {
                    if let Some(update) = decode_color_updated(codec, log) {
                        let _ = tx.send(update);
                    }
                }
            }
        });
    }

    pub fn stop_event_listener(&mut self) {
        if let Some(control) = self.listener_control.take() {
            let _ = control.send(ListenerControl::Stop);
        }
        self.events_enabled = false;
    }

    /// Apply a decoded event: the store gets the truth, the pending
    /// tracker clears its overlay and cancels the matching fallback.
    pub fn handle_chain_event(&mut self, update: ChainEventUpdate) {
        match update {
            ChainEventUpdate::Minted {
                coord,
                owner,
                color,
            } => {
                let was_pending = self.pending.on_chain_event(coord);
                let color = color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
                self.store.apply_event(coord, color, owner);
                self.total_minted += 1;
                if was_pending {
                    self.add_status_message(format!("Mint confirmed on-chain for {}.", coord));
                } else {
                    self.log_background(format!("Pixel {} minted by another user.", coord));
                }
            }
            ChainEventUpdate::ColorUpdated {
                coord,
                color,
                owner,
            } => {
                let was_pending = self.pending.on_chain_event(coord);
                self.store.apply_event(coord, color, owner);
                if was_pending {
                    self.add_status_message(format!("Color update confirmed for {}.", coord));
                } else {
                    self.log_background(format!("Pixel {} recolored by another user.", coord));
                }
            }
            ChainEventUpdate::ListenerFailed { error } => {
                // Silent degradation: fallback timers carry reconciliation
                // until a manual refresh restarts the listener.
                self.events_enabled = false;
                self.listener_control = None;
                self.log_background(format!("Event watching disabled: {}", error));
            }
        }
    }
}

/// Transfers from the zero address are mints; everything else (secondary
/// transfers, composite escrow moves) is ignored here and picked up by the
/// next chunk fetch of the affected region.
async fn decode_mint(
    chain: &ChainClient,
    codec: Codec,
    log: &LogEntry,
) -> Option<ChainEventUpdate> {
    if log.event != "Transfer" {
        return None;
    }
    let from = log.args.get("from")?.as_str()?;
    if !from.eq_ignore_ascii_case(ZERO_ADDRESS) {
        return None;
    }
    let to = log.args.get("to")?.as_str()?.to_string();
    let token_id = arg_u64(&log.args, "tokenId")?;
    // Composite mints carry out-of-range ids; there is no single pixel to
    // update for them.
    let coord = codec.decode(token_id)?;

    // The transfer log has no color; read it now. A failed read still
    // reports the mint with the default color.
    let color = chain.get_color(coord.x, coord.y).await.ok();
    Some(ChainEventUpdate::Minted {
        coord,
        owner: to,
        color,
    })
}

fn decode_color_updated(codec: Codec, log: &LogEntry) -> Option<ChainEventUpdate> {
    if log.event != "ColorUpdated" {
        return None;
    }
    let x = arg_u64(&log.args, "x")?;
    let y = arg_u64(&log.args, "y")?;
    if !codec.in_bounds(x as i32, y as i32) {
        return None;
    }
    let color = log.args.get("color")?.as_str()?.to_string();
    let owner = log.args.get("owner")?.as_str()?.to_string();
    Some(ChainEventUpdate::ColorUpdated {
        coord: crate::coords::PixelCoord::new(x as u16, y as u16),
        color,
        owner,
    })
}

fn arg_u64(args: &serde_json::Value, key: &str) -> Option<u64> {
    let value = args.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn color_updated_decodes_with_string_numbers() {
        let codec = Codec::new(100, 100);
        let log = LogEntry {
            event: "ColorUpdated".to_string(),
            args: json!({
                "tokenId": "703",
                "x": "3",
                "y": 7,
                "color": "#00ff00",
                "owner": "0xABC"
            }),
        };
        match decode_color_updated(codec, &log) {
            Some(ChainEventUpdate::ColorUpdated { coord, color, owner }) => {
                assert_eq!((coord.x, coord.y), (3, 7));
                assert_eq!(color, "#00ff00");
                assert_eq!(owner, "0xABC");
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn color_updated_out_of_bounds_is_dropped() {
        let codec = Codec::new(10, 10);
        let log = LogEntry {
            event: "ColorUpdated".to_string(),
            args: json!({ "x": 50, "y": 2, "color": "#000000", "owner": "0xABC" }),
        };
        assert!(decode_color_updated(codec, &log).is_none());
    }
}
