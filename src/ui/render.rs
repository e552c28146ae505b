use crate::app_state::{App, InputMode};
use crate::coords::PixelCoord;
use crate::ui::helpers::hex_to_color;
use crate::ui::popups::{
    render_gallery_popup, render_help_popup, render_metadata_popup, render_status_log_popup,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use std::time::Instant;

pub fn render_ui(app: &mut App, frame: &mut Frame) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Input / config header
            Constraint::Min(0),    // Canvas viewport
            Constraint::Length(7), // Status
        ])
        .split(frame.size());

    render_header(app, frame, main_layout[0]);
    render_board_display(app, frame, main_layout[1]);
    render_status_area(app, frame, main_layout[2]);

    match app.input_mode {
        InputMode::ShowHelp => render_help_popup(frame),
        InputMode::ShowStatusLog => render_status_log_popup(app, frame),
        InputMode::ShowMetadata => render_metadata_popup(app, frame),
        InputMode::ShowGallery => render_gallery_popup(app, frame),
        _ => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    match app.input_mode {
        InputMode::EnterGatewayUrl
        | InputMode::EnterWalletAddress
        | InputMode::EnterPosition
        | InputMode::EnterHexColor
        | InputMode::EnterDelegate => {
            let title = match app.input_mode {
                InputMode::EnterGatewayUrl => "Wallet Gateway URL (Editing):",
                InputMode::EnterWalletAddress => "Wallet Address (Editing, Enter to skip):",
                InputMode::EnterPosition => "Go To Position x,y (Editing):",
                InputMode::EnterHexColor => "Custom Hex Color (Editing):",
                InputMode::EnterDelegate => "Delegate Operator Address (Editing):",
                _ => "Input:",
            };
            let input_widget = Paragraph::new(app.input_buffer.as_str())
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(input_widget, area);
            frame.set_cursor(area.x + app.input_buffer.len() as u16 + 1, area.y + 1);
        }
        _ => {
            let wallet = app
                .wallet_address
                .as_deref()
                .map(App::short_address)
                .unwrap_or_else(|| "view-only".to_string());
            let mut display_text = format!(
                "Gateway: {} | Wallet: {} | Color: {} | Events: {}",
                app.chain.gateway_url(),
                wallet,
                app.selected_color,
                if app.events_enabled { "on" } else { "off" }
            );
            display_text.push_str(
                "\nq: Quit | ?: Help | r: Refresh | g: Go to | d: Draw | b: Batch | m: Mint | u: Update | a: Delegate | o: Compose | t: Token | n: Gallery | s: Log",
            );

            let title = app
                .collection_name
                .clone()
                .unwrap_or_else(|| "Pixel Canvas (on-chain)".to_string());
            let header_widget = Paragraph::new(display_text)
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(header_widget, area);
        }
    }
}

fn render_board_display(app: &mut App, frame: &mut Frame, area: Rect) {
    let inner_area = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    app.board_area_bounds = Some((
        inner_area.x,
        inner_area.y,
        inner_area.width,
        inner_area.height,
    ));

    let viewport = app.viewport.viewport();
    let loading = !app.scheduler.is_idle();
    let board_title = if loading {
        format!(
            "Canvas (Viewport @ {},{} size {} | zoom {}% | loading {} chunk(s)...)",
            viewport.x,
            viewport.y,
            viewport.size,
            app.zoom_percentage(),
            app.scheduler.queue_depth() + app.scheduler.in_flight_count(),
        )
    } else {
        format!(
            "Canvas (Viewport @ {},{} size {} | zoom {}%)",
            viewport.x,
            viewport.y,
            viewport.size,
            app.zoom_percentage(),
        )
    };

    let board_block = Block::default().borders(Borders::ALL).title(board_title);
    frame.render_widget(board_block, area);

    let now = Instant::now();
    let highlight = app.viewport.highlight(now, app.config.highlight_duration);

    // Two canvas rows per terminal row via half blocks: the glyph's
    // foreground is the upper pixel, its background the lower.
    let visible_cols = (viewport.size).min(inner_area.width);
    let visible_row_pairs = viewport.size.div_ceil(2).min(inner_area.height);

    let mut lines: Vec<Line> = Vec::with_capacity(visible_row_pairs as usize);
    for pair in 0..visible_row_pairs {
        let mut spans: Vec<Span> = Vec::with_capacity(visible_cols as usize);
        for col in 0..visible_cols {
            let upper = PixelCoord::new(viewport.x + col, viewport.y + pair * 2);
            let upper_color = cell_color(app, upper, highlight);
            let lower_y = viewport.y + pair * 2 + 1;
            let lower_color = if lower_y < viewport.y + viewport.size
                && (lower_y as u32) < app.config.height as u32
            {
                cell_color(app, PixelCoord::new(viewport.x + col, lower_y), highlight)
            } else {
                Color::Reset
            };
            spans.push(Span::styled(
                "▀",
                Style::default().fg(upper_color).bg(lower_color),
            ));
        }
        lines.push(Line::from(spans));
    }

    let board_widget = Paragraph::new(lines);
    frame.render_widget(board_widget, inner_area);
}

/// Overlay precedence for one cell: pending operation, draw-mode
/// selection, selection preview, go-to highlight, then ground truth from
/// the store. The store itself never holds optimistic state.
fn cell_color(app: &App, coord: PixelCoord, highlight: Option<PixelCoord>) -> Color {
    if app.pending.is_pending(coord) {
        return Color::Yellow;
    }
    if app.draw_mode {
        if let Some(color) = app.drawn_pixels.get(&coord) {
            return hex_to_color(color, Color::Magenta);
        }
    }
    let record = app.store.read(coord);
    let minted = record.is_some_and(|r| r.minted);
    if highlight == Some(coord) {
        return Color::LightYellow;
    }
    if !app.draw_mode && app.selected_pixel == Some(coord) && !minted {
        return hex_to_color(&app.selected_color, Color::Magenta);
    }
    match record {
        Some(record) if record.minted => hex_to_color(&record.color, Color::Gray),
        Some(_) => Color::White,
        // Never fetched (or evicted): dim until its chunk lands.
        None => Color::DarkGray,
    }
}

fn render_status_area(app: &App, frame: &mut Frame, area: Rect) {
    let selection_line = match app.selected_pixel {
        Some(coord) => match app.store.read(coord) {
            Some(record) if record.minted => format!(
                "Selected {}: minted, owner {}, color {}{}",
                coord,
                record
                    .owner
                    .as_deref()
                    .map(App::short_address)
                    .unwrap_or_else(|| "unknown".to_string()),
                record.color,
                if app.pending.is_pending(coord) {
                    " (pending)"
                } else {
                    ""
                }
            ),
            Some(_) => format!("Selected {}: available to mint", coord),
            None => format!("Selected {}: not loaded yet", coord),
        },
        None => "No pixel selected (click the canvas)".to_string(),
    };

    let mode_line = if app.draw_mode {
        format!(
            "Draw mode: {} pixel(s) staged, 'b' submits, 'x' clears",
            app.drawn_pixels.len()
        )
    } else if app.input_mode == InputMode::ComposeSelect {
        match app.compose_anchor {
            Some(anchor) => format!("Composing from {}: click opposite corner, Enter", anchor),
            None => "Composing: pick an anchor".to_string(),
        }
    } else {
        format!("Tracked transactions: {}", app.pending.tracked_count())
    };

    let text = format!(
        "{}\n{}\n{}\n{}",
        app.status_message,
        app.progress_line(),
        selection_line,
        mode_line
    );
    let status_widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status_widget, area);
}
