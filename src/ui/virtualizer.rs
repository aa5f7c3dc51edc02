/// Row virtualizer - decides which rows of a panel get materialized
///
/// Sizes are abstract units (terminal lines in the TUI). Each row starts at its
/// estimated size; after a row is drawn the renderer reports its real size through
/// [`Virtualizer::measure`], which shifts the offsets of every following row.
///
/// Architecture:
/// rows (projected, sorted)
///     → Virtualizer (size cache keyed by row key + scroll offset)
///         → VirtualWindow (visible range, overscan, offsets, total size)
///             → table renderer
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, trace};

/// How measured sizes are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureMode {
    /// Measurements replace estimates
    Dynamic,
    /// Every row uses the estimate; for renderers that report wrong sizes
    Static,
}

/// A row that should be materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualItem {
    pub index: usize,
    pub start: u32,
    pub size: u32,
}

impl VirtualItem {
    pub fn end(&self) -> u32 {
        self.start + self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VirtualWindow {
    /// Rows geometrically inside the viewport
    pub visible: Range<usize>,
    /// `visible` widened by the overscan on both sides; what gets rendered
    pub rendered: Range<usize>,
    /// One item per index in `rendered`
    pub items: Vec<VirtualItem>,
    /// Sum of every row size; sizes the scrollbar
    pub total_size: u32,
}

impl VirtualWindow {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Start offset of row `index` when every row is `size` high, saturating at `u32::MAX`
fn uniform_offset(size: u32, index: usize) -> u32 {
    let offset = u64::from(size).saturating_mul(index as u64);
    u32::try_from(offset).unwrap_or(u32::MAX)
}

fn widen(visible: &Range<usize>, overscan: usize, total: usize) -> Range<usize> {
    visible.start.saturating_sub(overscan)..visible.end.saturating_add(overscan).min(total)
}

/// Window over `total_rows` rows that all have `estimated_row_height`.
///
/// Pure: no cache, no state. An offset past the end is clamped to the last row.
pub fn compute_window(
    total_rows: usize,
    viewport_height: u32,
    scroll_offset: u32,
    estimated_row_height: u32,
    overscan: usize,
) -> VirtualWindow {
    if total_rows == 0 {
        return VirtualWindow::default();
    }
    let size = estimated_row_height.max(1);
    let total_size = uniform_offset(size, total_rows);

    let first = ((scroll_offset / size) as usize).min(total_rows - 1);
    let end = if viewport_height == 0 {
        first
    } else {
        let last_offset = scroll_offset.saturating_add(viewport_height - 1);
        ((last_offset / size) as usize).min(total_rows - 1) + 1
    };
    let visible = first..end;
    let rendered = widen(&visible, overscan, total_rows);

    let items = rendered
        .clone()
        .map(|index| VirtualItem {
            index,
            start: uniform_offset(size, index),
            size,
        })
        .collect();

    VirtualWindow {
        visible,
        rendered,
        items,
        total_size,
    }
}

/// Virtualizer with a per-row size cache
#[derive(Debug, Clone)]
pub struct Virtualizer {
    estimate: u32,
    overscan: usize,
    mode: MeasureMode,

    /// Row keys in display order
    keys: Vec<String>,
    /// Measured sizes by row key; survives re-sorts
    measured: HashMap<String, u32>,
    /// Prefix offsets, `starts[i]` is where row i begins, `starts[len]` the total
    starts: Vec<u32>,
    offsets_dirty: bool,

    scroll_offset: u32,
    viewport_height: u32,
}

impl Virtualizer {
    pub fn new(estimate: u32, overscan: usize, mode: MeasureMode) -> Self {
        Self {
            estimate: estimate.max(1),
            overscan,
            mode,
            keys: Vec::new(),
            measured: HashMap::new(),
            starts: vec![0],
            offsets_dirty: false,
            scroll_offset: 0,
            viewport_height: 0,
        }
    }

    pub fn mode(&self) -> MeasureMode {
        self.mode
    }

    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    /// Replace the row sequence; called when the row count or order changes
    pub fn set_rows(&mut self, keys: Vec<String>) {
        if keys != self.keys {
            debug!(target: "viewport", "rows changed: {} -> {}", self.keys.len(), keys.len());
            self.keys = keys;
            self.offsets_dirty = true;
            self.clamp_scroll();
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        if height != self.viewport_height {
            self.viewport_height = height;
            self.clamp_scroll();
        }
    }

    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll_offset = offset;
        self.clamp_scroll();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let next = (self.scroll_offset as i64 + delta).max(0);
        self.scroll_to(next.min(u32::MAX as i64) as u32);
    }

    /// Scroll the minimum needed for row `index` to be fully inside the viewport
    pub fn scroll_to_index(&mut self, index: usize) {
        if index >= self.keys.len() {
            return;
        }
        self.refresh_offsets();
        let start = self.starts[index];
        let end = self.starts[index + 1];
        if start < self.scroll_offset {
            self.scroll_to(start);
        } else if end > self.scroll_offset + self.viewport_height {
            self.scroll_to(end.saturating_sub(self.viewport_height));
        }
    }

    /// Post-render size correction for the row with `key`.
    /// Returns true when the cached size changed and offsets must be recomputed.
    pub fn measure(&mut self, key: &str, size: u32) -> bool {
        if self.mode == MeasureMode::Static {
            return false;
        }
        let size = size.max(1);
        let previous = self.measured.get(key).copied().unwrap_or(self.estimate);
        if previous == size {
            return false;
        }
        trace!(target: "viewport", "row '{}' measured {} (was {})", key, size, previous);
        self.measured.insert(key.to_string(), size);
        self.offsets_dirty = true;
        self.clamp_scroll();
        true
    }

    pub fn size_of_key(&self, key: &str) -> u32 {
        match self.mode {
            MeasureMode::Static => self.estimate,
            MeasureMode::Dynamic => self.measured.get(key).copied().unwrap_or(self.estimate),
        }
    }

    pub fn total_size(&mut self) -> u32 {
        self.refresh_offsets();
        self.starts[self.keys.len()]
    }

    fn refresh_offsets(&mut self) {
        if !self.offsets_dirty && self.starts.len() == self.keys.len() + 1 {
            return;
        }
        let mut starts = Vec::with_capacity(self.keys.len() + 1);
        let mut acc = 0u32;
        starts.push(acc);
        for key in &self.keys {
            acc = acc.saturating_add(self.size_of_key(key));
            starts.push(acc);
        }
        self.starts = starts;
        self.offsets_dirty = false;
    }

    fn clamp_scroll(&mut self) {
        let max = self.total_size().saturating_sub(self.viewport_height);
        if self.scroll_offset > max {
            self.scroll_offset = max;
        }
    }

    /// Index of the row covering `offset`; offsets past the end map to the last row
    fn index_at(&self, offset: u32) -> usize {
        let n = self.keys.len();
        let idx = self.starts[..n].partition_point(|&s| s <= offset);
        idx.saturating_sub(1).min(n.saturating_sub(1))
    }

    /// Rows to render for the current scroll offset and cache state
    pub fn window(&mut self) -> VirtualWindow {
        self.refresh_offsets();
        let total = self.keys.len();
        if total == 0 {
            return VirtualWindow::default();
        }

        let first = self.index_at(self.scroll_offset);
        let end = if self.viewport_height == 0 {
            first
        } else {
            self.index_at(self.scroll_offset.saturating_add(self.viewport_height - 1)) + 1
        };
        let visible = first..end;
        let rendered = widen(&visible, self.overscan, total);

        let items = rendered
            .clone()
            .map(|index| VirtualItem {
                index,
                start: self.starts[index],
                size: self.starts[index + 1] - self.starts[index],
            })
            .collect();

        VirtualWindow {
            visible,
            rendered,
            items,
            total_size: self.starts[total],
        }
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_empty_window() {
        let w = compute_window(0, 400, 120, 33, 5);
        assert!(w.is_empty());
        assert_eq!(w.total_size, 0);
        assert!(w.visible.is_empty());
        assert!(w.rendered.is_empty());
    }

    #[test]
    fn test_uniform_window_with_overscan() {
        // rows of 33, viewport 100 at offset 330: rows 10..14 are on screen
        let w = compute_window(1000, 100, 330, 33, 5);
        assert_eq!(w.visible, 10..14);
        assert_eq!(w.rendered, 5..19);
        assert_eq!(w.total_size, 33_000);
        assert_eq!(w.items.first().map(|i| i.start), Some(165));
    }

    #[test]
    fn test_window_is_clamped_at_both_ends() {
        let w = compute_window(10, 100, 0, 33, 5);
        assert_eq!(w.rendered.start, 0);
        let w = compute_window(10, 100, 10_000, 33, 5);
        assert_eq!(w.visible, 9..10);
        assert_eq!(w.rendered, 4..10);
    }

    #[test]
    fn test_window_covers_every_row_in_viewport() {
        for total in [1usize, 7, 50] {
            for height in [1u32, 5, 33, 90] {
                for offset in (0..(total as u32 * 10)).step_by(7) {
                    let w = compute_window(total, height, offset, 10, 2);
                    let top = offset.min((total as u32 - 1) * 10);
                    for i in 0..total {
                        let (s, e) = (i as u32 * 10, i as u32 * 10 + 10);
                        if s < top + height && e > top {
                            assert!(w.rendered.contains(&i), "row {} missing at offset {}", i, offset);
                        }
                    }
                    let indices: Vec<usize> = w.items.iter().map(|i| i.index).collect();
                    assert_eq!(indices, w.rendered.clone().collect::<Vec<_>>());
                }
            }
        }
    }

    #[test]
    fn test_huge_row_count_saturates_offsets() {
        let w = compute_window(200_000_000, 600, u32::MAX - 10, 33, 100);
        assert_eq!(w.total_size, u32::MAX);
        assert!(!w.visible.is_empty());
        assert!(w.rendered.end <= 200_000_000);
        assert!(w.items.windows(2).all(|pair| pair[0].start <= pair[1].start));
        assert_eq!(w.items.last().map(|i| i.start), Some(u32::MAX));

        let w = compute_window(usize::MAX, 10, 0, 1, 3);
        assert_eq!(w.total_size, u32::MAX);
        assert_eq!(w.visible, 0..10);
    }

    #[test]
    fn test_measure_shifts_following_rows() {
        let mut v = Virtualizer::new(1, 0, MeasureMode::Dynamic);
        v.set_rows(keys(10));
        v.set_viewport_height(4);
        assert_eq!(v.total_size(), 10);

        assert!(v.measure("t1", 3));
        assert!(!v.measure("t1", 3));
        let w = v.window();
        assert_eq!(w.total_size, 12);
        assert_eq!(w.visible, 0..2);
        assert_eq!(w.items[1].size, 3);
        assert_eq!(w.items[1].end(), 4);
    }

    #[test]
    fn test_measurements_survive_reordering() {
        let mut v = Virtualizer::new(1, 0, MeasureMode::Dynamic);
        v.set_rows(keys(3));
        v.set_viewport_height(10);
        v.measure("t2", 4);

        v.set_rows(vec!["t2".into(), "t0".into(), "t1".into()]);
        let w = v.window();
        assert_eq!(w.items[0].size, 4);
        assert_eq!(w.items[1].start, 4);
    }

    #[test]
    fn test_static_mode_ignores_measurements() {
        let mut v = Virtualizer::new(2, 1, MeasureMode::Static);
        v.set_rows(keys(5));
        v.set_viewport_height(4);
        assert!(!v.measure("t0", 7));
        assert_eq!(v.total_size(), 10);
        assert_eq!(v.window().visible, 0..2);
    }

    #[test]
    fn test_scroll_is_clamped_and_follows_cursor() {
        let mut v = Virtualizer::new(1, 0, MeasureMode::Dynamic);
        v.set_rows(keys(20));
        v.set_viewport_height(5);

        v.scroll_to(100);
        assert_eq!(v.scroll_offset(), 15);
        v.scroll_by(-20);
        assert_eq!(v.scroll_offset(), 0);

        v.scroll_to_index(9);
        assert_eq!(v.scroll_offset(), 5);
        assert_eq!(v.window().visible, 5..10);
        v.scroll_to_index(2);
        assert_eq!(v.scroll_offset(), 2);
    }

    #[test]
    fn test_shrinking_measurement_clamps_scroll() {
        let mut v = Virtualizer::new(1, 0, MeasureMode::Dynamic);
        v.set_rows(keys(10));
        v.set_viewport_height(5);
        for key in keys(10) {
            v.measure(&key, 3);
        }
        v.scroll_to(25);
        assert_eq!(v.scroll_offset(), 25);

        assert!(v.measure("t9", 1));
        assert_eq!(v.total_size(), 28);
        assert_eq!(v.scroll_offset(), 23);
        assert_eq!(v.window().visible, 7..10);
    }

    #[test]
    fn test_shrinking_rows_clamps_scroll() {
        let mut v = Virtualizer::new(1, 0, MeasureMode::Dynamic);
        v.set_rows(keys(20));
        v.set_viewport_height(5);
        v.scroll_to(15);
        v.set_rows(keys(3));
        assert_eq!(v.scroll_offset(), 0);
        assert_eq!(v.window().visible, 0..3);
    }
}
