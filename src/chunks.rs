use crate::config::CanvasConfig;
use crate::coords::{ChunkId, PixelCoord};
use crate::viewport::Viewport;

/// A chunk selected for loading, tagged with its fetch priority. Lower
/// priority value = closer to the viewport center = fetched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub id: ChunkId,
    /// Squared Euclidean distance (in pixel units, x4 to stay integral)
    /// from chunk center to viewport center.
    pub priority: u64,
}

/// Compute the chunks intersecting the viewport plus `buffer` pixels of
/// margin, clipped to canvas bounds, ordered by priority ascending. Ties
/// break on (cy, cx) so identical inputs always produce identical output.
pub fn required_chunks(
    config: &CanvasConfig,
    viewport: Viewport,
    buffer: u16,
) -> Vec<ChunkDescriptor> {
    let chunk_size = config.chunk_size;
    let start_x = viewport.x.saturating_sub(buffer);
    let start_y = viewport.y.saturating_sub(buffer);
    let end_x = (viewport.x + viewport.size + buffer).min(config.width);
    let end_y = (viewport.y + viewport.size + buffer).min(config.height);
    if start_x >= end_x || start_y >= end_y {
        return Vec::new();
    }

    let chunk_cols = config.width.div_ceil(chunk_size);
    let chunk_rows = config.height.div_ceil(chunk_size);
    let start_cx = start_x / chunk_size;
    let start_cy = start_y / chunk_size;
    // end_x/end_y are exclusive; the last covered pixel decides the last chunk.
    let end_cx = ((end_x - 1) / chunk_size).min(chunk_cols - 1);
    let end_cy = ((end_y - 1) / chunk_size).min(chunk_rows - 1);

    // Viewport center, doubled to keep the arithmetic integral.
    let view_center_x2 = viewport.x as i64 * 2 + viewport.size as i64;
    let view_center_y2 = viewport.y as i64 * 2 + viewport.size as i64;

    let mut chunks = Vec::new();
    for cy in start_cy..=end_cy {
        for cx in start_cx..=end_cx {
            let chunk_center_x2 = cx as i64 * chunk_size as i64 * 2 + chunk_size as i64;
            let chunk_center_y2 = cy as i64 * chunk_size as i64 * 2 + chunk_size as i64;
            let dx = chunk_center_x2 - view_center_x2;
            let dy = chunk_center_y2 - view_center_y2;
            chunks.push(ChunkDescriptor {
                id: ChunkId { cx, cy },
                priority: (dx * dx + dy * dy) as u64,
            });
        }
    }

    chunks.sort_by_key(|c| (c.priority, c.id.cy, c.id.cx));
    chunks
}

/// Row-major coordinates covered by a chunk, clipped to canvas bounds
/// (edge chunks may be partial on grids not divisible by the chunk size).
pub fn chunk_pixels(config: &CanvasConfig, id: ChunkId) -> Vec<PixelCoord> {
    let start_x = id.cx * config.chunk_size;
    let start_y = id.cy * config.chunk_size;
    let end_x = (start_x + config.chunk_size).min(config.width);
    let end_y = (start_y + config.chunk_size).min(config.height);

    let mut pixels = Vec::with_capacity(config.chunk_size as usize * config.chunk_size as usize);
    for y in start_y..end_y {
        for x in start_x..end_x {
            pixels.push(PixelCoord::new(x, y));
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CanvasConfig {
        CanvasConfig::default()
    }

    #[test]
    fn chunks_cover_buffered_viewport_without_gaps() {
        let config = config();
        let viewport = Viewport {
            x: 12,
            y: 33,
            size: 20,
        };
        let buffer = 5;
        let chunks = required_chunks(&config, viewport, buffer);

        let covered: std::collections::HashSet<PixelCoord> = chunks
            .iter()
            .flat_map(|c| chunk_pixels(&config, c.id))
            .collect();

        for y in viewport.y.saturating_sub(buffer)..(viewport.y + viewport.size + buffer).min(100) {
            for x in
                viewport.x.saturating_sub(buffer)..(viewport.x + viewport.size + buffer).min(100)
            {
                assert!(
                    covered.contains(&PixelCoord::new(x, y)),
                    "gap at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn no_chunk_extends_outside_canvas() {
        let config = config();
        let viewport = Viewport {
            x: 90,
            y: 90,
            size: 10,
        };
        for chunk in required_chunks(&config, viewport, 10) {
            assert!(chunk.id.cx < 20 && chunk.id.cy < 20);
            for pixel in chunk_pixels(&config, chunk.id) {
                assert!(pixel.x < 100 && pixel.y < 100);
            }
        }
    }

    #[test]
    fn closest_chunk_comes_first() {
        let config = config();
        let viewport = Viewport {
            x: 40,
            y: 40,
            size: 20,
        };
        let chunks = required_chunks(&config, viewport, 0);
        // Viewport center is (50, 50); chunk (9,9) spans 45..50 with
        // center (47.5, 47.5), tied with (10,9), (9,10) and (10,10). The
        // (cy, cx) tie-break makes (9,9) first.
        assert_eq!(chunks[0].id, ChunkId { cx: 9, cy: 9 });
        for pair in chunks.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }

    #[test]
    fn ordering_is_deterministic() {
        let config = config();
        let viewport = Viewport {
            x: 7,
            y: 19,
            size: 30,
        };
        let a = required_chunks(&config, viewport, 5);
        let b = required_chunks(&config, viewport, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn edge_chunks_are_clipped_on_uneven_grids() {
        let config = CanvasConfig::default().with_grid(12, 12);
        let pixels = chunk_pixels(&config, ChunkId { cx: 2, cy: 2 });
        assert_eq!(pixels.len(), 4); // 2x2 remainder of a 12x12 grid in 5s
        assert!(pixels.iter().all(|p| p.x >= 10 && p.x < 12));
    }

    #[test]
    fn small_grid_viewport_spans_all_chunks() {
        let config = CanvasConfig::default().with_grid(10, 10);
        let viewport = Viewport {
            x: 0,
            y: 0,
            size: 10,
        };
        let chunks = required_chunks(&config, viewport, 0);
        assert_eq!(chunks.len(), 4);
    }
}
