//! crates/open_blinkist_core/src/carousel.rs
//!
//! Navigation state for the one-insight-at-a-time view over a summary.

/// Minimum horizontal drag distance, in pointer units, that counts as a swipe.
pub const SWIPE_THRESHOLD: f64 = 100.0;

/// Arrow keys the carousel reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
}

/// Pointer tracking for an in-progress drag gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    pub start_x: f64,
    pub current_x: f64,
    pub drag_offset: f64,
    pub is_dragging: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Carousel {
    len: usize,
    current_index: usize,
    drag: DragState,
}

impl Carousel {
    /// A carousel over `len` insights, positioned on the first one.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn next(&mut self) -> bool {
        if self.current_index + 1 < self.len {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.current_index > 0 {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps straight to insight `index`. Targets outside the summary are ignored.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.len {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    pub fn handle_key(&mut self, key: NavKey) -> bool {
        match key {
            NavKey::Left => self.prev(),
            NavKey::Right => self.next(),
        }
    }

    pub fn drag_start(&mut self, x: f64) {
        self.drag = DragState {
            start_x: x,
            current_x: x,
            drag_offset: 0.0,
            is_dragging: true,
        };
    }

    pub fn drag_move(&mut self, x: f64) {
        if !self.drag.is_dragging {
            return;
        }
        self.drag.current_x = x;
        self.drag.drag_offset = x - self.drag.start_x;
    }

    /// Finishes the gesture. A drag to the right beyond the threshold goes
    /// back, a drag to the left goes forward. The offset is cleared either way.
    pub fn drag_end(&mut self) -> bool {
        if !self.drag.is_dragging {
            return false;
        }
        let offset = self.drag.drag_offset;
        self.drag.is_dragging = false;
        self.drag.drag_offset = 0.0;

        if offset.abs() > SWIPE_THRESHOLD {
            if offset > 0.0 {
                self.prev()
            } else {
                self.next()
            }
        } else {
            false
        }
    }

    /// The dot-navigation caption, e.g. `"1 OF 3"`.
    pub fn position_label(&self) -> String {
        if self.is_empty() {
            return String::from("0 OF 0");
        }
        format!("{} OF {}", self.current_index + 1, self.len)
    }
}
