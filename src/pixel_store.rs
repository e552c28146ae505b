use crate::coords::{ChunkId, Codec, PixelCoord};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_COLOR: &str = "#ffffff";

/// Ground-truth state of one pixel as last read from the chain. Pending
/// optimistic state never lands here; it is overlaid at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelRecord {
    pub color: String,
    pub owner: Option<String>,
    pub minted: bool,
}

impl PixelRecord {
    pub fn unminted() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            owner: None,
            minted: false,
        }
    }

    pub fn minted(color: String, owner: String) -> Self {
        let color = if color.is_empty() {
            DEFAULT_COLOR.to_string()
        } else {
            color
        };
        Self {
            color,
            owner: Some(owner),
            minted: true,
        }
    }
}

/// Per-coordinate outcome of a chunk fetch: `Some((owner, color))` when
/// both lookups succeeded, `None` when either failed (reads as unminted).
pub type ChunkPixelResult = (PixelCoord, Option<(String, String)>);

/// Authoritative client-side cache of the canvas. All mutation goes
/// through the three merge operations; each applies its whole slice before
/// returning so a render never observes a half-merged chunk.
#[derive(Debug, Default)]
pub struct PixelStore {
    pixels: HashMap<PixelCoord, PixelRecord>,
    loaded_chunks: HashSet<ChunkId>,
}

impl PixelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a completed chunk fetch. Every coordinate of the chunk gets a
    /// concrete record; a coordinate whose lookups failed collapses to an
    /// explicit unminted record rather than staying absent, which would
    /// otherwise re-trigger fetches forever.
    pub fn merge_chunk(&mut self, chunk: ChunkId, results: Vec<ChunkPixelResult>) {
        let records: Vec<(PixelCoord, PixelRecord)> = results
            .into_iter()
            .map(|(coord, outcome)| {
                let record = match outcome {
                    Some((owner, color)) => PixelRecord::minted(color, owner),
                    None => PixelRecord::unminted(),
                };
                (coord, record)
            })
            .collect();
        self.pixels.extend(records);
        self.loaded_chunks.insert(chunk);
    }

    /// Unconditional overwrite from the event listener or fallback path.
    pub fn apply_event(&mut self, coord: PixelCoord, color: String, owner: String) {
        self.pixels.insert(coord, PixelRecord::minted(color, owner));
    }

    /// Drop every chunk (and its pixels) farther than `radius` chunks from
    /// `center` (Chebyshev distance). Returns how many chunks went away.
    pub fn evict_beyond(
        &mut self,
        codec: &Codec,
        chunk_size: u16,
        center: ChunkId,
        radius: u16,
    ) -> usize {
        let stale: Vec<ChunkId> = self
            .loaded_chunks
            .iter()
            .copied()
            .filter(|id| chunk_distance(*id, center) > radius)
            .collect();
        if stale.is_empty() {
            return 0;
        }

        for id in &stale {
            self.loaded_chunks.remove(id);
        }
        self.pixels
            .retain(|coord, _| chunk_distance(codec.chunk_of(*coord, chunk_size), center) <= radius);
        stale.len()
    }

    pub fn read(&self, coord: PixelCoord) -> Option<&PixelRecord> {
        self.pixels.get(&coord)
    }

    pub fn is_chunk_loaded(&self, id: ChunkId) -> bool {
        self.loaded_chunks.contains(&id)
    }

    /// Forget loaded-chunk bookkeeping so a refresh re-fetches the
    /// viewport. Pixel records stay visible until fresh data replaces them.
    pub fn invalidate_chunks(&mut self) {
        self.loaded_chunks.clear();
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded_chunks.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
}

fn chunk_distance(a: ChunkId, b: ChunkId) -> u16 {
    let dx = a.cx.abs_diff(b.cx);
    let dy = a.cy.abs_diff(b.cy);
    dx.max(dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(cx: u16, cy: u16) -> ChunkId {
        ChunkId { cx, cy }
    }

    #[test]
    fn merge_writes_minted_and_explicit_unminted() {
        let mut store = PixelStore::new();
        store.merge_chunk(
            chunk(0, 0),
            vec![
                (
                    PixelCoord::new(2, 2),
                    Some(("0xABC".to_string(), "#ff0000".to_string())),
                ),
                (PixelCoord::new(2, 3), None),
            ],
        );

        let hit = store.read(PixelCoord::new(2, 2)).unwrap();
        assert!(hit.minted);
        assert_eq!(hit.owner.as_deref(), Some("0xABC"));
        assert_eq!(hit.color, "#ff0000");

        let miss = store.read(PixelCoord::new(2, 3)).unwrap();
        assert!(!miss.minted);
        assert_eq!(miss.owner, None);
        assert_eq!(miss.color, DEFAULT_COLOR);
    }

    #[test]
    fn empty_color_collapses_to_default() {
        let mut store = PixelStore::new();
        store.merge_chunk(
            chunk(0, 0),
            vec![(
                PixelCoord::new(0, 0),
                Some(("0xABC".to_string(), String::new())),
            )],
        );
        assert_eq!(store.read(PixelCoord::new(0, 0)).unwrap().color, DEFAULT_COLOR);
    }

    #[test]
    fn apply_event_overwrites_unminted() {
        let mut store = PixelStore::new();
        store.merge_chunk(chunk(1, 1), vec![(PixelCoord::new(5, 5), None)]);
        store.apply_event(
            PixelCoord::new(5, 5),
            "#00ff00".to_string(),
            "0xDEF".to_string(),
        );
        let record = store.read(PixelCoord::new(5, 5)).unwrap();
        assert!(record.minted);
        assert_eq!(record.color, "#00ff00");
    }

    #[test]
    fn eviction_respects_cleanup_radius() {
        let codec = Codec::new(100, 100);
        let mut store = PixelStore::new();
        // Near chunk (0,0) and far chunk (10,10).
        store.merge_chunk(chunk(0, 0), vec![(PixelCoord::new(1, 1), None)]);
        store.merge_chunk(chunk(10, 10), vec![(PixelCoord::new(52, 52), None)]);

        let removed = store.evict_beyond(&codec, 5, chunk(1, 1), 3);
        assert_eq!(removed, 1);
        assert!(store.is_chunk_loaded(chunk(0, 0)));
        assert!(!store.is_chunk_loaded(chunk(10, 10)));
        assert!(store.read(PixelCoord::new(1, 1)).is_some());
        assert!(store.read(PixelCoord::new(52, 52)).is_none());
    }

    #[test]
    fn evicted_chunk_reloads_as_absent() {
        let codec = Codec::new(100, 100);
        let mut store = PixelStore::new();
        store.merge_chunk(chunk(10, 10), vec![(PixelCoord::new(52, 52), None)]);
        store.evict_beyond(&codec, 5, chunk(0, 0), 3);
        // Back to absent: a settle near it must schedule it again.
        assert!(!store.is_chunk_loaded(chunk(10, 10)));
        assert_eq!(store.pixel_count(), 0);
    }

    #[test]
    fn invalidate_keeps_pixels_but_forgets_chunks() {
        let mut store = PixelStore::new();
        store.merge_chunk(chunk(0, 0), vec![(PixelCoord::new(1, 1), None)]);
        store.invalidate_chunks();
        assert!(!store.is_chunk_loaded(chunk(0, 0)));
        assert!(store.read(PixelCoord::new(1, 1)).is_some());
    }
}
