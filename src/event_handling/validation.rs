use crate::coords::{Codec, PixelCoord};

/// Input problems caught before anything touches the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BadHexColor(String),
    CoordinateOutOfRange { max_x: u16, max_y: u16 },
    NotANumber(String),
    BadAddress(String),
    EmptyRegion,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::BadHexColor(input) => {
                write!(f, "'{}' is not a hex color (use #RGB or #RRGGBB)", input)
            }
            ValidationError::CoordinateOutOfRange { max_x, max_y } => {
                write!(f, "coordinates must be within 0-{} x 0-{}", max_x, max_y)
            }
            ValidationError::NotANumber(input) => write!(f, "'{}' is not a number", input),
            ValidationError::BadAddress(input) => {
                write!(f, "'{}' is not an address (0x + 40 hex digits)", input)
            }
            ValidationError::EmptyRegion => write!(f, "selection region is empty"),
        }
    }
}

/// Accepts `#RGB` or `#RRGGBB`, returns the normalized lowercase 6-digit
/// form the contract stores.
pub fn normalize_hex_color(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix('#')
        .ok_or_else(|| ValidationError::BadHexColor(trimmed.to_string()))?;

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::BadHexColor(trimmed.to_string()));
    }

    match digits.len() {
        6 => Ok(format!("#{}", digits.to_ascii_lowercase())),
        3 => {
            let expanded: String = digits
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_lowercase();
            Ok(format!("#{}", expanded))
        }
        _ => Err(ValidationError::BadHexColor(trimmed.to_string())),
    }
}

pub fn parse_coordinates(
    x_input: &str,
    y_input: &str,
    codec: &Codec,
) -> Result<PixelCoord, ValidationError> {
    let x: i32 = x_input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(x_input.trim().to_string()))?;
    let y: i32 = y_input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(y_input.trim().to_string()))?;
    if !codec.in_bounds(x, y) {
        return Err(ValidationError::CoordinateOutOfRange {
            max_x: codec.width() - 1,
            max_y: codec.height() - 1,
        });
    }
    Ok(PixelCoord::new(x as u16, y as u16))
}

pub fn parse_address(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::BadAddress(trimmed.to_string()))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::BadAddress(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Orders two corners into an inclusive (min, max) rectangle.
pub fn normalize_region(
    a: PixelCoord,
    b: PixelCoord,
) -> Result<(PixelCoord, PixelCoord), ValidationError> {
    let min = PixelCoord::new(a.x.min(b.x), a.y.min(b.y));
    let max = PixelCoord::new(a.x.max(b.x), a.y.max(b.y));
    if min == max {
        // A single pixel is not a region worth composing.
        return Err(ValidationError::EmptyRegion);
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_normalize() {
        assert_eq!(normalize_hex_color("#FF0000").unwrap(), "#ff0000");
        assert_eq!(normalize_hex_color("#f00").unwrap(), "#ff0000");
        assert_eq!(normalize_hex_color(" #ABCdef ").unwrap(), "#abcdef");
    }

    #[test]
    fn bad_hex_colors_rejected() {
        for input in ["ff0000", "#ff00", "#gggggg", "#", "red"] {
            assert!(normalize_hex_color(input).is_err(), "accepted {input}");
        }
    }

    #[test]
    fn coordinates_bounds_checked() {
        let codec = Codec::new(100, 100);
        assert_eq!(
            parse_coordinates("99", "0", &codec).unwrap(),
            PixelCoord::new(99, 0)
        );
        assert!(parse_coordinates("100", "0", &codec).is_err());
        assert!(parse_coordinates("-1", "5", &codec).is_err());
        assert!(parse_coordinates("abc", "5", &codec).is_err());
    }

    #[test]
    fn addresses_validated() {
        let good = format!("0x{}", "ab".repeat(20));
        assert!(parse_address(&good).is_ok());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(&format!("1x{}", "ab".repeat(20))).is_err());
        assert!(parse_address(&format!("0x{}zz", "ab".repeat(19))).is_err());
    }

    #[test]
    fn regions_normalize_corners() {
        let (min, max) = normalize_region(PixelCoord::new(9, 2), PixelCoord::new(3, 8)).unwrap();
        assert_eq!(min, PixelCoord::new(3, 2));
        assert_eq!(max, PixelCoord::new(9, 8));
        assert!(normalize_region(PixelCoord::new(5, 5), PixelCoord::new(5, 5)).is_err());
    }
}
