//! Bounded, height-ordered windows over recent chain data

/// Anything positioned at a block height
pub trait Height {
    fn height(&self) -> u64;
}

/// Recent items, newest first, at most one per height, never more than `cap`.
///
/// A new head is authoritative for its own height and everything above it:
/// stale siblings and anything from an abandoned higher branch are dropped.
#[derive(Clone, Debug)]
pub struct BoundedWindow<T> {
    items: Vec<T>,
    cap: usize,
}

impl<T: Height> BoundedWindow<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        BoundedWindow {
            items: Vec::with_capacity(cap),
            cap,
        }
    }

    pub fn insert(&mut self, head: T) {
        let h = head.height();
        let mut next = Vec::with_capacity(self.cap);
        next.push(head);
        next.extend(
            std::mem::take(&mut self.items)
                .into_iter()
                .filter(|old| old.height() < h)
                .take(self.cap - 1),
        );
        // retained entries are already descending; keep it true for any input
        next.sort_by(|a, b| b.height().cmp(&a.height()));
        self.items = next;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// Authors seen for the current height.
///
/// Several candidates can be announced for one height before it settles; they
/// accumulate until a different height shows up, which starts a fresh round.
#[derive(Clone, Debug)]
pub struct RoundAuthors<A> {
    height: Option<u64>,
    authors: Vec<A>,
    cap: usize,
}

impl<A: Clone> RoundAuthors<A> {
    pub fn new(cap: usize) -> Self {
        RoundAuthors {
            height: None,
            authors: Vec::new(),
            cap: cap.max(1),
        }
    }

    pub fn observe(&mut self, height: u64, author: Option<&A>) {
        if self.height != Some(height) {
            self.height = Some(height);
            self.authors = author.into_iter().cloned().collect();
        } else if let Some(a) = author {
            if self.authors.len() == self.cap {
                self.authors.remove(0);
            }
            self.authors.push(a.clone());
        }
    }

    pub fn height(&self) -> Option<u64> {
        self.height
    }

    pub fn authors(&self) -> &[A] {
        &self.authors
    }
}
