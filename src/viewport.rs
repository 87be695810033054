//! Pause/resume and display order for a live window

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Live,
    Paused,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    fn flipped(self) -> Self {
        match self {
            SortOrder::NewestFirst => SortOrder::OldestFirst,
            SortOrder::OldestFirst => SortOrder::NewestFirst,
        }
    }
}

/// Display-side view over a window stored newest first.
///
/// While paused the view shows a frozen copy taken at pause time; the live
/// window keeps updating underneath and shows again on resume.
#[derive(Clone, Debug)]
pub struct Viewport<T> {
    frozen: Option<Vec<T>>,
    order: SortOrder,
    cap: usize,
}

impl<T: Clone> Viewport<T> {
    pub fn new(cap: usize) -> Self {
        Viewport {
            frozen: None,
            order: SortOrder::NewestFirst,
            cap: cap.max(1),
        }
    }

    pub fn mode(&self) -> ViewMode {
        if self.frozen.is_some() {
            ViewMode::Paused
        } else {
            ViewMode::Live
        }
    }

    pub fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Freeze the first `cap` entries of `live` (stored newest first)
    pub fn pause(&mut self, live: &[T]) {
        if self.frozen.is_some() {
            return;
        }
        let mut snapshot: Vec<T> = live.iter().take(self.cap).cloned().collect();
        if self.order == SortOrder::OldestFirst {
            snapshot.reverse();
        }
        self.frozen = Some(snapshot);
    }

    pub fn resume(&mut self) {
        self.frozen = None;
    }

    pub fn toggle_order(&mut self) {
        self.order = self.order.flipped();
        if let Some(frozen) = self.frozen.as_mut() {
            frozen.reverse();
        }
    }

    /// Rows to show, in display order
    pub fn rows<'a>(&'a self, live: &'a [T]) -> Vec<&'a T> {
        match (&self.frozen, self.order) {
            (Some(frozen), _) => frozen.iter().collect(),
            (None, SortOrder::NewestFirst) => live.iter().collect(),
            (None, SortOrder::OldestFirst) => live.iter().rev().collect(),
        }
    }
}
