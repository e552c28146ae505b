use crate::app_state::{App, GalleryScope, InputMode};
use crate::chain_client::ChainClient;
use crate::coords::PixelCoord;
use crate::event_handling::validation::{normalize_hex_color, parse_address, parse_coordinates};
use crate::gallery::GalleryFilter;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use std::io;
use std::time::{Duration, Instant};

impl App {
    pub async fn handle_events(&mut self) -> io::Result<()> {
        // Apply everything the background tasks produced since last tick.
        while let Ok(outcome) = self.chunk_rx.try_recv() {
            self.handle_chunk_outcome(outcome);
        }
        while let Ok(update) = self.tx_rx.try_recv() {
            self.handle_tx_update(update);
        }
        while let Ok(update) = self.event_rx.try_recv() {
            self.handle_chain_event(update);
        }
        while let Ok(outcome) = self.fallback_rx.try_recv() {
            self.handle_fallback_outcome(outcome);
        }
        while let Ok(outcome) = self.lookup_rx.try_recv() {
            self.handle_lookup_outcome(outcome);
        }

        let now = Instant::now();
        if let Some(viewport) = self
            .viewport
            .take_settled(now, self.config.viewport_debounce)
        {
            self.handle_viewport_settle(viewport);
        }
        self.tick_fallbacks(now);
        self.maybe_start_event_listener(now);
        self.cleanup_old_status_messages();

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key_event) => {
                    if key_event.kind == KeyEventKind::Press {
                        self.handle_key_input(key_event.code);
                    }
                }
                Event::Mouse(mouse_event) => {
                    self.handle_mouse_input(mouse_event);
                }
                _ => { /* Other events */ }
            }
        }

        Ok(())
    }

    fn handle_key_input(&mut self, code: KeyCode) {
        match self.input_mode {
            InputMode::EnterGatewayUrl
            | InputMode::EnterWalletAddress
            | InputMode::EnterPosition
            | InputMode::EnterHexColor
            | InputMode::EnterDelegate => self.handle_text_input(code),
            InputMode::ShowHelp | InputMode::ShowStatusLog | InputMode::ShowMetadata => {
                // Any key dismisses the popup.
                self.input_mode = InputMode::None;
            }
            InputMode::ShowGallery => self.handle_gallery_key(code),
            InputMode::ComposeSelect => self.handle_compose_key(code),
            InputMode::None => self.handle_canvas_key(code),
        }
    }

    fn handle_text_input(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::None;
                self.input_buffer.clear();
                self.status_message = "Input cancelled.".to_string();
            }
            KeyCode::Enter => self.commit_text_input(),
            _ => {}
        }
    }

    fn commit_text_input(&mut self) {
        let input = std::mem::take(&mut self.input_buffer);
        match self.input_mode {
            InputMode::EnterGatewayUrl => {
                let url = input.trim().to_string();
                if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
                    self.status_message =
                        "Invalid URL. Must start with http:// or https://. Re-enter gateway URL:"
                            .to_string();
                    return;
                }
                self.chain = ChainClient::new(url.clone());
                self.settings.gateway_url = Some(url);
                self.save_settings();
                self.input_mode = InputMode::EnterWalletAddress;
                self.status_message =
                    "Gateway set. Enter wallet address (or Enter for view-only):".to_string();
            }
            InputMode::EnterWalletAddress => {
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    self.wallet_address = None;
                    self.status_message = "View-only mode. Loading viewport...".to_string();
                } else {
                    match parse_address(trimmed) {
                        Ok(address) => {
                            self.status_message = format!(
                                "Wallet {} connected. Loading viewport...",
                                Self::short_address(&address)
                            );
                            self.settings.wallet_address = Some(address.clone());
                            self.wallet_address = Some(address);
                            self.save_settings();
                        }
                        Err(e) => {
                            self.status_message = format!("{}. Re-enter wallet address:", e);
                            return;
                        }
                    }
                }
                self.input_mode = InputMode::None;
                self.viewport.force_settle();
                self.trigger_total_minted_fetch();
                self.trigger_contract_info_fetch();
            }
            InputMode::EnterPosition => {
                let parts: Vec<&str> = input
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parts.len() != 2 {
                    self.status_message = "Enter position as 'x,y':".to_string();
                    return;
                }
                match parse_coordinates(parts[0], parts[1], &self.codec) {
                    Ok(coord) => {
                        self.viewport.go_to(coord, Instant::now());
                        self.selected_pixel = Some(coord);
                        self.input_mode = InputMode::None;
                        self.add_status_message(format!("Jumped to pixel {}.", coord));
                    }
                    Err(e) => {
                        self.status_message = format!("{}. Enter position as 'x,y':", e);
                    }
                }
            }
            InputMode::EnterHexColor => match normalize_hex_color(&input) {
                Ok(color) => {
                    self.add_status_message(format!("Custom color {} selected.", color));
                    self.selected_color = color;
                    self.input_mode = InputMode::None;
                }
                Err(e) => {
                    self.status_message = format!("{}. Enter hex color:", e);
                }
            },
            InputMode::EnterDelegate => {
                self.input_mode = InputMode::None;
                self.submit_delegation(&input);
            }
            _ => {}
        }
    }

    fn handle_canvas_key(&mut self, code: KeyCode) {
        let now = Instant::now();
        match code {
            KeyCode::Char('q') => self.exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.viewport.pan_by(0, -1, now),
            KeyCode::Down | KeyCode::Char('j') => self.viewport.pan_by(0, 1, now),
            KeyCode::Left | KeyCode::Char('h') => self.viewport.pan_by(-1, 0, now),
            KeyCode::Right | KeyCode::Char('l') => self.viewport.pan_by(1, 0, now),
            KeyCode::Char('+') | KeyCode::Char('=') => self.viewport.zoom_in(None, now),
            KeyCode::Char('-') => self.viewport.zoom_out(None, now),
            KeyCode::Char('[') => self.cycle_palette(-1),
            KeyCode::Char(']') => self.cycle_palette(1),
            KeyCode::Char('c') => {
                self.input_mode = InputMode::EnterHexColor;
                self.input_buffer.clear();
                self.status_message = "Enter hex color (e.g. #ff0000):".to_string();
            }
            KeyCode::Char('g') => {
                self.input_mode = InputMode::EnterPosition;
                self.input_buffer.clear();
                self.status_message = format!(
                    "Enter position as 'x,y' (0-{}, 0-{}):",
                    self.config.width - 1,
                    self.config.height - 1
                );
            }
            KeyCode::Char('m') => {
                if let Some(coord) = self.selected_pixel {
                    self.submit_mint(coord);
                } else {
                    self.status_message = "Click a pixel first.".to_string();
                }
            }
            KeyCode::Char('u') => {
                if let Some(coord) = self.selected_pixel {
                    self.submit_update(coord);
                } else {
                    self.status_message = "Click a pixel first.".to_string();
                }
            }
            KeyCode::Char('d') => {
                self.draw_mode = !self.draw_mode;
                if self.draw_mode {
                    self.add_status_message(
                        "Draw mode on: click pixels, 'b' submits the batch.".to_string(),
                    );
                } else {
                    self.drawn_pixels.clear();
                    self.add_status_message("Draw mode off, selection cleared.".to_string());
                }
            }
            KeyCode::Char('b') => self.submit_drawn_batch(),
            KeyCode::Char('x') => {
                self.drawn_pixels.clear();
                self.status_message = "Drawn selection cleared.".to_string();
            }
            KeyCode::Char('o') => {
                if let Some(coord) = self.selected_pixel {
                    self.compose_anchor = Some(coord);
                    self.input_mode = InputMode::ComposeSelect;
                    self.status_message = format!(
                        "Compose anchor {}. Click the opposite corner, then Enter.",
                        coord
                    );
                } else {
                    self.status_message = "Click a pixel to anchor the composition.".to_string();
                }
            }
            KeyCode::Char('a') => {
                self.input_mode = InputMode::EnterDelegate;
                self.input_buffer.clear();
                self.status_message = "Enter operator address to delegate to:".to_string();
            }
            KeyCode::Char('t') => self.open_metadata_for_selection(),
            KeyCode::Char('n') => self.open_gallery(),
            KeyCode::Char('r') => self.refresh_board(),
            KeyCode::Char('w') => {
                self.input_mode = InputMode::EnterGatewayUrl;
                self.input_buffer.clear();
                self.status_message = "Enter wallet gateway URL:".to_string();
            }
            KeyCode::Char('?') => self.input_mode = InputMode::ShowHelp,
            KeyCode::Char('s') => self.input_mode = InputMode::ShowStatusLog,
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.compose_anchor = None;
                self.input_mode = InputMode::None;
                self.status_message = "Composition cancelled.".to_string();
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::None;
                if let Some(corner) = self.selected_pixel {
                    self.submit_compose(corner);
                } else {
                    self.compose_anchor = None;
                    self.status_message = "No corner selected; composition cancelled.".to_string();
                }
            }
            // Panning still works while choosing the second corner.
            _ => self.handle_canvas_nav_only(code),
        }
    }

    fn handle_canvas_nav_only(&mut self, code: KeyCode) {
        let now = Instant::now();
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.viewport.pan_by(0, -1, now),
            KeyCode::Down | KeyCode::Char('j') => self.viewport.pan_by(0, 1, now),
            KeyCode::Left | KeyCode::Char('h') => self.viewport.pan_by(-1, 0, now),
            KeyCode::Right | KeyCode::Char('l') => self.viewport.pan_by(1, 0, now),
            KeyCode::Char('+') | KeyCode::Char('=') => self.viewport.zoom_in(None, now),
            KeyCode::Char('-') => self.viewport.zoom_out(None, now),
            _ => {}
        }
    }

    fn handle_gallery_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.input_mode = InputMode::None,
            KeyCode::Up => {
                self.gallery_view.selection = self.gallery_view.selection.saturating_sub(1);
            }
            KeyCode::Down => {
                if !self.gallery_view.tokens.is_empty() {
                    self.gallery_view.selection = (self.gallery_view.selection + 1)
                        .min(self.gallery_view.tokens.len() - 1);
                }
            }
            KeyCode::Char('f') => {
                self.gallery_view.filter = match self.gallery_view.filter {
                    GalleryFilter::Pixels => GalleryFilter::Composed,
                    GalleryFilter::Composed => GalleryFilter::Pixels,
                };
                self.trigger_gallery_fetch();
            }
            KeyCode::Char('o') => {
                self.gallery_view.scope = match self.gallery_view.scope {
                    GalleryScope::Collection => GalleryScope::Mine,
                    GalleryScope::Mine => GalleryScope::Collection,
                };
                self.trigger_gallery_fetch();
            }
            KeyCode::Enter => {
                if let Some(token) = self
                    .gallery_view
                    .tokens
                    .get(self.gallery_view.selection)
                {
                    let token_id = token.token_id;
                    self.trigger_metadata_fetch(token_id);
                }
            }
            _ => {}
        }
    }

    fn cycle_palette(&mut self, direction: i32) {
        let len = crate::app_state::COLOR_PALETTE.len() as i32;
        let next = (self.palette_index as i32 + direction).rem_euclid(len) as usize;
        self.palette_index = next;
        self.selected_color = crate::app_state::COLOR_PALETTE[next].to_string();
        self.status_message = format!("Color {} selected.", self.selected_color);
    }

    fn handle_mouse_input(&mut self, mouse: MouseEvent) {
        let now = Instant::now();
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(coord) = self.screen_to_pixel(mouse.column, mouse.row) {
                    self.click_pixel(coord);
                }
                self.viewport.drag_start(mouse.column, mouse.row);
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.viewport.drag_move(mouse.column, mouse.row, now);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.viewport.drag_end();
            }
            MouseEventKind::ScrollUp => {
                let anchor = self.screen_to_pixel(mouse.column, mouse.row);
                self.viewport.zoom_in(anchor, now);
            }
            MouseEventKind::ScrollDown => {
                let anchor = self.screen_to_pixel(mouse.column, mouse.row);
                self.viewport.zoom_out(anchor, now);
            }
            _ => {}
        }
    }

    fn click_pixel(&mut self, coord: PixelCoord) {
        if self.draw_mode {
            self.toggle_drawn_pixel(coord);
            return;
        }
        self.selected_pixel = Some(coord);
        if self.input_mode == InputMode::ComposeSelect {
            self.status_message = format!("Corner {} selected. Enter composes.", coord);
        }
    }

    fn toggle_drawn_pixel(&mut self, coord: PixelCoord) {
        if self.drawn_pixels.remove(&coord).is_some() {
            return;
        }
        if self.pending.is_pending(coord) {
            self.status_message = format!("Pixel {} has a pending operation.", coord);
            return;
        }
        match self.store.read(coord) {
            Some(record) if record.minted => {
                let owned = self.wallet_address.as_deref().is_some_and(|wallet| {
                    record
                        .owner
                        .as_deref()
                        .is_some_and(|o| o.eq_ignore_ascii_case(wallet))
                });
                if owned {
                    self.drawn_pixels.insert(coord, self.selected_color.clone());
                } else {
                    self.status_message = format!("Pixel {} belongs to someone else.", coord);
                }
            }
            _ => {
                self.drawn_pixels.insert(coord, self.selected_color.clone());
            }
        }
    }

    /// Map a terminal cell to the canvas pixel under it. Each cell column
    /// is one pixel; each cell row holds two pixel rows (half blocks), and
    /// a click resolves to the upper one.
    fn screen_to_pixel(&self, column: u16, row: u16) -> Option<PixelCoord> {
        let (bx, by, bw, bh) = self.board_area_bounds?;
        if column < bx || row < by || column >= bx + bw || row >= by + bh {
            return None;
        }
        let viewport = self.viewport.viewport();
        let dx = column - bx;
        let dy = (row - by) * 2;
        if dx >= viewport.size || dy >= viewport.size {
            return None;
        }
        let coord = PixelCoord::new(viewport.x + dx, viewport.y + dy);
        if self.codec.in_bounds(coord.x as i32, coord.y as i32) {
            Some(coord)
        } else {
            None
        }
    }
}
