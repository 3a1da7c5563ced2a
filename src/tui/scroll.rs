// Transcript scrolling
//
// Line-based scroll state with auto-follow: new content keeps the view pinned
// to the bottom until the user scrolls up; scrolling back to the bottom
// re-enables following.

#[derive(Debug, Clone)]
pub struct ScrollState {
    /// First visible line
    offset: usize,
    total: usize,
    viewport: usize,
    pub auto_follow: bool,
}

impl ScrollState {
    pub fn new() -> Self {
        Self {
            offset: 0,
            total: 0,
            viewport: 0,
            auto_follow: true,
        }
    }

    /// Sync with the current content and viewport sizes; call every frame
    pub fn update_dimensions(&mut self, total: usize, viewport: usize) {
        self.total = total;
        self.viewport = viewport;
        if self.auto_follow {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        if self.offset > 0 {
            self.offset = self.offset.saturating_sub(lines);
            self.auto_follow = false;
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.max_offset());
        if self.offset >= self.max_offset() {
            self.auto_follow = true;
        }
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport.max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
        self.auto_follow = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
        self.auto_follow = true;
    }

    /// Move the minimum distance that puts `start..end` on screen
    ///
    /// A span taller than the viewport is aligned to its first line.
    pub fn reveal(&mut self, start: usize, end: usize) {
        if start < self.offset || end.saturating_sub(start) > self.viewport {
            self.offset = start;
        } else if end > self.offset + self.viewport {
            self.offset = end - self.viewport;
        } else {
            return;
        }
        self.offset = self.offset.min(self.max_offset());
        self.auto_follow = self.offset >= self.max_offset();
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Visible line range, end exclusive
    pub fn visible_range(&self) -> (usize, usize) {
        (self.offset, (self.offset + self.viewport).min(self.total))
    }

    pub fn needs_scrollbar(&self) -> bool {
        self.total > self.viewport
    }

    fn max_offset(&self) -> usize {
        self.total.saturating_sub(self.viewport)
    }
}

impl Default for ScrollState {
    fn default() -> Self {
        Self::new()
    }
}
