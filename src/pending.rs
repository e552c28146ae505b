use crate::coords::PixelCoord;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

pub type OpId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Mint,
    Update,
    BatchMint(usize),
    BatchUpdate(usize),
    Compose(usize),
    Delegation(usize),
}

impl TxKind {
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Mint => "mint",
            TxKind::Update => "color update",
            TxKind::BatchMint(_) => "batch mint",
            TxKind::BatchUpdate(_) => "batch update",
            TxKind::Compose(_) => "composition",
            TxKind::Delegation(_) => "delegation",
        }
    }

    /// User-facing confirmation line, distinct per operation kind.
    pub fn success_message(&self) -> String {
        match self {
            TxKind::Mint => "Pixel minted successfully.".to_string(),
            TxKind::Update => "Pixel color updated.".to_string(),
            TxKind::BatchMint(n) => format!("Batch mint confirmed: {} pixels.", n),
            TxKind::BatchUpdate(n) => format!("Batch update confirmed: {} pixels.", n),
            TxKind::Compose(n) => format!("Composed {} pixels into one token.", n),
            TxKind::Delegation(n) => format!("Delegation approved for {} pixel(s).", n),
        }
    }

    fn overlays_as_mint(&self) -> bool {
        matches!(self, TxKind::Mint | TxKind::BatchMint(_))
    }

    fn overlays_as_update(&self) -> bool {
        // Composition transfers the pixels it consumes, so they render as
        // busy the same way an update does. Delegation changes no pixel
        // state and draws no overlay.
        matches!(
            self,
            TxKind::Update | TxKind::BatchUpdate(_) | TxKind::Compose(_)
        )
    }
}

/// One submitted chain operation being watched to completion.
#[derive(Debug, Clone)]
pub struct TrackedOp {
    pub id: OpId,
    pub kind: TxKind,
    /// Coordinates still awaiting reconciliation. Events peel these off
    /// one by one; whatever remains when the fallback fires is re-fetched.
    pub pixels: Vec<PixelCoord>,
    pub tx_hash: Option<String>,
    pub submitted_at: Instant,
    fallback_deadline: Option<Instant>,
}

/// Tracks every in-flight operation, keyed by a local op id, each with its
/// own fallback deadline. The event path and the fallback path are
/// mutually cancelling: an event that reconciles the last coordinate of an
/// operation removes it before its deadline can fire, and a fired deadline
/// removes it before any late event could double-apply (the late event's
/// write is idempotent against the re-fetched truth).
#[derive(Debug, Default)]
pub struct PendingTracker {
    next_id: OpId,
    pending_mints: HashSet<PixelCoord>,
    pending_updates: HashSet<PixelCoord>,
    ops: HashMap<OpId, TrackedOp>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation optimistically, before the write resolves.
    pub fn submit(&mut self, kind: TxKind, pixels: Vec<PixelCoord>, now: Instant) -> OpId {
        let id = self.next_id;
        self.next_id += 1;

        if kind.overlays_as_mint() {
            self.pending_mints.extend(pixels.iter().copied());
        } else if kind.overlays_as_update() {
            self.pending_updates.extend(pixels.iter().copied());
        }

        self.ops.insert(
            id,
            TrackedOp {
                id,
                kind,
                pixels,
                tx_hash: None,
                submitted_at: now,
                fallback_deadline: None,
            },
        );
        id
    }

    pub fn attach_hash(&mut self, id: OpId, hash: String) {
        if let Some(op) = self.ops.get_mut(&id) {
            op.tx_hash = Some(hash);
        }
    }

    /// The write itself failed (user rejected, simulation revert): undo the
    /// optimistic entry. No fallback is armed for a rolled-back op.
    pub fn rollback(&mut self, id: OpId) -> Option<TrackedOp> {
        let op = self.ops.remove(&id)?;
        self.clear_overlay(&op);
        Some(op)
    }

    /// Receipt confirmed: start this operation's fallback clock.
    pub fn arm_fallback(&mut self, id: OpId, deadline: Instant) -> Option<TxKind> {
        let op = self.ops.get_mut(&id)?;
        op.fallback_deadline = Some(deadline);
        Some(op.kind)
    }

    /// A chain event reconciled `coord`. Clears the overlay for it and
    /// cancels the owning operation's fallback once every coordinate has
    /// been seen. Returns true if the coordinate was pending at all.
    pub fn on_chain_event(&mut self, coord: PixelCoord) -> bool {
        let was_pending =
            self.pending_mints.remove(&coord) | self.pending_updates.remove(&coord);

        let mut completed = None;
        for op in self.ops.values_mut() {
            let before = op.pixels.len();
            op.pixels.retain(|p| *p != coord);
            if before != op.pixels.len() && op.pixels.is_empty() {
                completed = Some(op.id);
                break;
            }
        }
        if let Some(id) = completed {
            self.ops.remove(&id);
        }
        was_pending
    }

    /// Operations whose fallback deadline has passed. Each is returned at
    /// most once; its remaining overlay entries are cleared here so the UI
    /// can never get stuck on "pending" even if the re-fetch then fails.
    pub fn due_fallbacks(&mut self, now: Instant) -> Vec<TrackedOp> {
        let due: Vec<OpId> = self
            .ops
            .values()
            .filter(|op| op.fallback_deadline.is_some_and(|d| d <= now))
            .map(|op| op.id)
            .collect();

        due.into_iter()
            .filter_map(|id| {
                let op = self.ops.remove(&id)?;
                self.clear_overlay(&op);
                Some(op)
            })
            .collect()
    }

    pub fn is_pending_mint(&self, coord: PixelCoord) -> bool {
        self.pending_mints.contains(&coord)
    }

    pub fn is_pending(&self, coord: PixelCoord) -> bool {
        self.pending_mints.contains(&coord) || self.pending_updates.contains(&coord)
    }

    pub fn tracked_count(&self) -> usize {
        self.ops.len()
    }

    fn clear_overlay(&mut self, op: &TrackedOp) {
        for coord in &op.pixels {
            self.pending_mints.remove(coord);
            self.pending_updates.remove(coord);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn coord(x: u16, y: u16) -> PixelCoord {
        PixelCoord::new(x, y)
    }

    #[test]
    fn event_before_deadline_cancels_fallback() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let id = tracker.submit(TxKind::Mint, vec![coord(5, 5)], now);
        tracker.attach_hash(id, "0xhash".to_string());
        tracker.arm_fallback(id, now + Duration::from_millis(2000));

        assert!(tracker.on_chain_event(coord(5, 5)));
        assert!(!tracker.is_pending(coord(5, 5)));
        // Fallback never fires: the op is gone.
        let fired = tracker.due_fallbacks(now + Duration::from_secs(10));
        assert!(fired.is_empty());
    }

    #[test]
    fn fallback_fires_exactly_once_without_event() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let id = tracker.submit(TxKind::Update, vec![coord(5, 5)], now);
        tracker.arm_fallback(id, now + Duration::from_millis(2000));

        assert!(tracker.due_fallbacks(now + Duration::from_millis(1999)).is_empty());
        let fired = tracker.due_fallbacks(now + Duration::from_millis(2000));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].pixels, vec![coord(5, 5)]);
        assert!(!tracker.is_pending(coord(5, 5)));
        // Second sweep finds nothing.
        assert!(tracker.due_fallbacks(now + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn rollback_clears_overlay_and_arms_nothing() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let id = tracker.submit(TxKind::Mint, vec![coord(1, 2)], now);
        assert!(tracker.is_pending_mint(coord(1, 2)));

        let op = tracker.rollback(id).unwrap();
        assert_eq!(op.kind, TxKind::Mint);
        assert!(!tracker.is_pending(coord(1, 2)));
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn batch_fallback_refetches_only_unreconciled_pixels() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let pixels = vec![coord(0, 0), coord(0, 1), coord(0, 2)];
        let id = tracker.submit(TxKind::BatchMint(3), pixels, now);
        tracker.arm_fallback(id, now + Duration::from_millis(2000));

        // Events cover two of three pixels; the op stays armed.
        tracker.on_chain_event(coord(0, 0));
        tracker.on_chain_event(coord(0, 1));
        assert_eq!(tracker.tracked_count(), 1);

        let fired = tracker.due_fallbacks(now + Duration::from_millis(2000));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].pixels, vec![coord(0, 2)]);
    }

    #[test]
    fn batch_fully_reconciled_by_events_cancels() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let id = tracker.submit(TxKind::BatchMint(2), vec![coord(3, 3), coord(4, 4)], now);
        tracker.arm_fallback(id, now + Duration::from_millis(2000));

        tracker.on_chain_event(coord(3, 3));
        tracker.on_chain_event(coord(4, 4));
        assert_eq!(tracker.tracked_count(), 0);
        assert!(tracker.due_fallbacks(now + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn independent_ops_have_independent_deadlines() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        let a = tracker.submit(TxKind::Mint, vec![coord(1, 1)], now);
        let b = tracker.submit(TxKind::Update, vec![coord(2, 2)], now);
        tracker.arm_fallback(a, now + Duration::from_millis(1000));
        tracker.arm_fallback(b, now + Duration::from_millis(3000));

        let first = tracker.due_fallbacks(now + Duration::from_millis(1500));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, TxKind::Mint);
        assert_eq!(tracker.tracked_count(), 1);
    }

    #[test]
    fn delegation_tracks_without_overlay() {
        let mut tracker = PendingTracker::new();
        let now = Instant::now();
        tracker.submit(TxKind::Delegation(1), vec![coord(7, 7)], now);
        assert!(!tracker.is_pending(coord(7, 7)));
        assert_eq!(tracker.tracked_count(), 1);
    }
}
