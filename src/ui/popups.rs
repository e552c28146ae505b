use crate::app_state::{App, GalleryScope};
use crate::ui::helpers::centered_rect;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

pub fn render_help_popup(frame: &mut Frame) {
    let area = centered_rect(70, 80, frame.size());
    frame.render_widget(Clear, area);

    let help_text = "\
Navigation
  Arrows / hjkl     Pan viewport
  + / -             Zoom in / out (mouse wheel works too)
  g                 Go to position (x,y) with highlight
  Mouse drag        Pan | Click: select pixel

Colors
  [ / ]             Cycle palette
  c                 Enter custom hex color

Actions (need a wallet address)
  m                 Mint selected pixel
  u                 Update selected pixel's color
  d                 Toggle draw mode (click to stage pixels)
  b                 Submit staged pixels (batch mint + batch update)
  x                 Clear staged pixels
  a                 Delegate update rights (selected or staged pixels)
  o                 Compose: anchor at selection, click corner, Enter

Data
  t                 Token metadata for selected pixel
  n                 Gallery (f: filter, o: scope, Enter: metadata)
  r                 Refresh viewport from chain
  s                 Status log
  w                 Reconfigure gateway/wallet
  q                 Quit

Any key closes this help.";

    let help_widget = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: false });
    frame.render_widget(help_widget, area);
}

pub fn render_status_log_popup(app: &App, frame: &mut Frame) {
    let area = centered_rect(80, 70, frame.size());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = app
        .status_messages
        .iter()
        .rev()
        .map(|entry| ListItem::new(format!("[{}] {}", entry.stamp, entry.text)))
        .collect();

    let list_widget = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Status Log (newest first, any key closes)"),
    );
    frame.render_widget(list_widget, area);
}

pub fn render_metadata_popup(app: &App, frame: &mut Frame) {
    let area = centered_rect(70, 70, frame.size());
    frame.render_widget(Clear, area);

    let text = if app.metadata_loading {
        "Fetching token metadata...".to_string()
    } else if let Some(view) = &app.metadata_view {
        let mut out = format!(
            "Token #{}\nName: {}\nDescription: {}\n",
            view.token_id, view.metadata.name, view.metadata.description
        );
        if !view.metadata.attributes.is_empty() {
            out.push_str("\nAttributes:\n");
            for attr in &view.metadata.attributes {
                out.push_str(&format!("  {}: {}\n", attr.trait_type, attr.value_text()));
            }
        }
        if let Some(composition) = &view.composition {
            out.push_str(&format!(
                "\nComposition: {} pixels, region ({},{}) to ({},{})\n",
                composition.token_ids.len(),
                composition.min_x,
                composition.min_y,
                composition.max_x,
                composition.max_y
            ));
        }
        let image = &view.metadata.image;
        let preview: String = image.chars().take(80).collect();
        out.push_str(&format!(
            "\nImage URI ({} bytes):\n  {}{}",
            image.len(),
            preview,
            if image.len() > 80 { "..." } else { "" }
        ));
        out
    } else {
        "No metadata loaded.".to_string()
    };

    let metadata_widget = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Token Metadata (any key closes)"),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(metadata_widget, area);
}

pub fn render_gallery_popup(app: &App, frame: &mut Frame) {
    let area = centered_rect(80, 80, frame.size());
    frame.render_widget(Clear, area);

    let scope = match app.gallery_view.scope {
        GalleryScope::Collection => "collection",
        GalleryScope::Mine => "mine",
    };
    let title = format!(
        "Gallery [{} / {}]{} - f: filter, o: scope, Enter: metadata, Esc: close",
        scope,
        app.gallery_view.filter.label(),
        if app.gallery_view.loading {
            " loading..."
        } else {
            ""
        }
    );

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(5)])
        .split(area);

    let items: Vec<ListItem> = if app.gallery_view.tokens.is_empty() && !app.gallery_view.loading {
        vec![ListItem::new("No tokens found (indexer may be unavailable).")]
    } else {
        app.gallery_view
            .tokens
            .iter()
            .map(|token| {
                let position = token
                    .coord
                    .map(|c| format!(" at {}", c))
                    .unwrap_or_default();
                let owner = if token.owner.is_empty() {
                    String::new()
                } else {
                    format!(" - {}", App::short_address(&token.owner))
                };
                ListItem::new(format!("#{} {}{}{}", token.token_id, token.name, position, owner))
            })
            .collect()
    };

    let list_widget = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::LightBlue),
        )
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    let selection = if app.gallery_view.tokens.is_empty() {
        None
    } else {
        Some(
            app.gallery_view
                .selection
                .min(app.gallery_view.tokens.len() - 1),
        )
    };
    list_state.select(selection);
    frame.render_stateful_widget(list_widget, layout[0], &mut list_state);

    let detail = selection
        .and_then(|i| app.gallery_view.tokens.get(i))
        .map(|token| {
            let mut lines = Vec::new();
            if !token.description.is_empty() {
                lines.push(token.description.clone());
            }
            let mut dates = Vec::new();
            if let Some(minted_at) = &token.minted_at {
                dates.push(format!("minted {}", minted_at));
            }
            if let Some(acquired_at) = &token.acquired_at {
                dates.push(format!("acquired {}", acquired_at));
            }
            if !dates.is_empty() {
                lines.push(dates.join(", "));
            }
            if !token.image.is_empty() {
                lines.push(format!("image: {} bytes", token.image.len()));
            }
            lines.join("\n")
        })
        .unwrap_or_default();
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    frame.render_widget(detail_widget, layout[1]);
}
