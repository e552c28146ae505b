use ratatui::prelude::*;

/// helper function to create a centered rect using up certain percentage of the available rect `r`
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Parse a `#rrggbb` string into a terminal color, falling back to gray
/// for anything malformed (store colors are normalized, but event payloads
/// come from the contract verbatim).
pub fn hex_to_color(hex: &str, fallback: Color) -> Color {
    let digits = match hex.strip_prefix('#') {
        Some(d) if d.len() == 6 => d,
        _ => return fallback,
    };
    let parse = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16);
    match (parse(0..2), parse(2..4), parse(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hex() {
        assert_eq!(hex_to_color("#ff0000", Color::Gray), Color::Rgb(255, 0, 0));
        assert_eq!(hex_to_color("#00d3dd", Color::Gray), Color::Rgb(0, 211, 221));
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(hex_to_color("red", Color::Gray), Color::Gray);
        assert_eq!(hex_to_color("#ff00", Color::Gray), Color::Gray);
        assert_eq!(hex_to_color("#zzzzzz", Color::Gray), Color::Gray);
    }
}
