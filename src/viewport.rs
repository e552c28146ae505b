use crate::config::CanvasConfig;
use crate::coords::PixelCoord;
use std::time::Instant;

/// Square sub-window of the canvas currently rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u16,
    pub y: u16,
    pub size: u16,
}

impl Viewport {
    pub fn contains(&self, coord: PixelCoord) -> bool {
        coord.x >= self.x
            && coord.x < self.x + self.size
            && coord.y >= self.y
            && coord.y < self.y + self.size
    }

    pub fn center(&self) -> (u16, u16) {
        (self.x + self.size / 2, self.y + self.size / 2)
    }
}

/// Owns pan/zoom state. Every mutation clamps the viewport into canvas
/// bounds and marks it dirty; the event loop polls `take_settled` so rapid
/// successive changes collapse into a single fetch wave.
#[derive(Debug)]
pub struct ViewportController {
    viewport: Viewport,
    width: u16,
    height: u16,
    min_size: u16,
    max_size: u16,
    zoom_step: u16,
    pan_threshold: u16,
    dragging: bool,
    last_pointer: (u16, u16),
    dirty_since: Option<Instant>,
    settle_now: bool,
    highlight: Option<(PixelCoord, Instant)>,
}

impl ViewportController {
    pub fn new(config: &CanvasConfig) -> Self {
        let size = config.min_viewport_size;
        Self {
            viewport: Viewport { x: 0, y: 0, size },
            width: config.width,
            height: config.height,
            min_size: config.min_viewport_size,
            max_size: config.max_viewport_size,
            zoom_step: config.zoom_step,
            pan_threshold: config.pan_threshold,
            dragging: false,
            last_pointer: (0, 0),
            dirty_since: None,
            settle_now: false,
            highlight: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Pan by a grid delta (keyboard). Clamped; no-ops do not mark dirty.
    pub fn pan_by(&mut self, dx: i32, dy: i32, now: Instant) {
        let max_x = (self.width - self.viewport.size) as i32;
        let max_y = (self.height - self.viewport.size) as i32;
        let new_x = (self.viewport.x as i32 + dx).clamp(0, max_x) as u16;
        let new_y = (self.viewport.y as i32 + dy).clamp(0, max_y) as u16;
        if new_x != self.viewport.x || new_y != self.viewport.y {
            self.viewport.x = new_x;
            self.viewport.y = new_y;
            self.dirty_since = Some(now);
        }
    }

    pub fn drag_start(&mut self, column: u16, row: u16) {
        self.dragging = true;
        self.last_pointer = (column, row);
    }

    /// Pointer drag. One terminal cell is one grid column; a cell row is
    /// two grid rows (half-block rendering). Movements below the threshold
    /// are ignored so tiny jitters don't thrash the debounce.
    pub fn drag_move(&mut self, column: u16, row: u16, now: Instant) {
        if !self.dragging {
            return;
        }
        let dx = column as i32 - self.last_pointer.0 as i32;
        let dy = row as i32 - self.last_pointer.1 as i32;
        if dx.unsigned_abs() < self.pan_threshold as u32
            && dy.unsigned_abs() < self.pan_threshold as u32
        {
            return;
        }
        // Drag moves the canvas under the pointer, so the viewport shifts
        // the opposite way.
        self.pan_by(-dx, -dy * 2, now);
        self.last_pointer = (column, row);
    }

    pub fn drag_end(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn zoom_in(&mut self, anchor: Option<PixelCoord>, now: Instant) {
        let new_size = self.viewport.size.saturating_sub(self.zoom_step).max(self.min_size);
        self.apply_zoom(new_size, anchor, now);
    }

    pub fn zoom_out(&mut self, anchor: Option<PixelCoord>, now: Instant) {
        let limit = self.max_size.min(self.width).min(self.height);
        let new_size = (self.viewport.size + self.zoom_step).min(limit);
        if new_size == limit {
            // Fully zoomed out: center on the canvas.
            self.viewport.size = new_size;
            self.viewport.x = (self.width - new_size) / 2;
            self.viewport.y = (self.height - new_size) / 2;
            self.dirty_since = Some(now);
            return;
        }
        self.apply_zoom(new_size, anchor, now);
    }

    fn apply_zoom(&mut self, new_size: u16, anchor: Option<PixelCoord>, now: Instant) {
        if new_size == self.viewport.size {
            return;
        }
        let (cx, cy) = match anchor {
            Some(coord) => (coord.x, coord.y),
            None => self.viewport.center(),
        };
        self.viewport.size = new_size;
        self.viewport.x = cx
            .saturating_sub(new_size / 2)
            .min(self.width - new_size);
        self.viewport.y = cy
            .saturating_sub(new_size / 2)
            .min(self.height - new_size);
        self.dirty_since = Some(now);
    }

    /// Center the viewport on an explicit coordinate and flag it with a
    /// transient highlight.
    pub fn go_to(&mut self, coord: PixelCoord, now: Instant) {
        let size = self.viewport.size;
        self.viewport.x = coord.x.saturating_sub(size / 2).min(self.width - size);
        self.viewport.y = coord.y.saturating_sub(size / 2).min(self.height - size);
        self.highlight = Some((coord, now));
        self.dirty_since = Some(now);
    }

    /// Returns the viewport once it has been dirty for the full debounce
    /// window, clearing the dirty flag. Movement inside the window pushes
    /// the settle out.
    pub fn take_settled(&mut self, now: Instant, debounce: std::time::Duration) -> Option<Viewport> {
        if self.settle_now {
            self.settle_now = false;
            self.dirty_since = None;
            return Some(self.viewport);
        }
        let since = self.dirty_since?;
        if now.duration_since(since) < debounce {
            return None;
        }
        self.dirty_since = None;
        Some(self.viewport)
    }

    /// Force an immediate settle on the next poll (startup, refresh).
    pub fn force_settle(&mut self) {
        self.settle_now = true;
    }

    pub fn highlight(&mut self, now: Instant, duration: std::time::Duration) -> Option<PixelCoord> {
        match self.highlight {
            Some((coord, set_at)) if now.duration_since(set_at) < duration => Some(coord),
            Some(_) => {
                self.highlight = None;
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> ViewportController {
        ViewportController::new(&CanvasConfig::default())
    }

    fn in_bounds(v: Viewport) -> bool {
        v.x + v.size <= 100 && v.y + v.size <= 100 && (10..=100).contains(&v.size)
    }

    #[test]
    fn panning_past_edges_stays_clamped() {
        let mut c = controller();
        let now = Instant::now();
        c.pan_by(-500, -500, now);
        assert_eq!((c.viewport().x, c.viewport().y), (0, 0));
        c.pan_by(5000, 5000, now);
        let v = c.viewport();
        assert_eq!((v.x, v.y), (100 - v.size, 100 - v.size));
        assert!(in_bounds(v));
    }

    #[test]
    fn zoom_sequence_never_leaves_bounds() {
        let mut c = controller();
        let now = Instant::now();
        for _ in 0..30 {
            c.zoom_out(None, now);
            assert!(in_bounds(c.viewport()));
        }
        assert_eq!(c.viewport().size, 100);
        for _ in 0..30 {
            c.zoom_in(Some(PixelCoord::new(99, 99)), now);
            assert!(in_bounds(c.viewport()));
        }
        assert_eq!(c.viewport().size, 10);
    }

    #[test]
    fn max_zoom_out_centers_canvas() {
        let mut c = controller();
        let now = Instant::now();
        c.pan_by(50, 50, now);
        for _ in 0..20 {
            c.zoom_out(None, now);
        }
        let v = c.viewport();
        assert_eq!((v.x, v.y, v.size), (0, 0, 100));
    }

    #[test]
    fn go_to_centers_and_highlights() {
        let mut c = controller();
        let now = Instant::now();
        c.go_to(PixelCoord::new(50, 50), now);
        let v = c.viewport();
        assert!(v.contains(PixelCoord::new(50, 50)));
        assert_eq!(v.center(), (50, 50));
        assert_eq!(
            c.highlight(now, Duration::from_secs(3)),
            Some(PixelCoord::new(50, 50))
        );
        assert_eq!(c.highlight(now + Duration::from_secs(4), Duration::from_secs(3)), None);
    }

    #[test]
    fn go_to_near_edge_clamps() {
        let mut c = controller();
        c.go_to(PixelCoord::new(99, 0), Instant::now());
        assert!(in_bounds(c.viewport()));
        assert!(c.viewport().contains(PixelCoord::new(99, 0)));
    }

    #[test]
    fn rapid_changes_collapse_into_one_settle() {
        let mut c = controller();
        let t0 = Instant::now();
        let debounce = Duration::from_millis(300);
        c.pan_by(1, 0, t0);
        assert_eq!(c.take_settled(t0 + Duration::from_millis(100), debounce), None);
        // More movement inside the window restarts it.
        c.pan_by(1, 0, t0 + Duration::from_millis(200));
        assert_eq!(c.take_settled(t0 + Duration::from_millis(400), debounce), None);
        let settled = c.take_settled(t0 + Duration::from_millis(600), debounce);
        assert!(settled.is_some());
        // Once taken, no second settle until something changes.
        assert_eq!(c.take_settled(t0 + Duration::from_secs(2), debounce), None);
    }

    #[test]
    fn sub_threshold_drag_is_ignored() {
        let mut c = controller();
        let now = Instant::now();
        c.drag_start(10, 10);
        c.drag_move(11, 10, now);
        assert_eq!((c.viewport().x, c.viewport().y), (0, 0));
        assert_eq!(c.take_settled(now + Duration::from_secs(1), Duration::from_millis(300)), None);
    }

    #[test]
    fn small_grid_clamps_to_grid_limit() {
        let config = CanvasConfig::default().with_grid(10, 10);
        let mut c = ViewportController::new(&config);
        let now = Instant::now();
        c.zoom_out(None, now);
        let v = c.viewport();
        assert!(v.size <= 10 && v.x + v.size <= 10 && v.y + v.size <= 10);
    }
}
