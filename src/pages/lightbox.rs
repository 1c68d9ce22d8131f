//! Full-screen photo viewer over the gallery

/// Overlay state over a fixed image sequence
///
/// Navigation wraps in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lightbox {
    images: Vec<String>,
    index: Option<usize>,
}

impl Lightbox {
    pub fn new(images: Vec<String>) -> Self {
        Self {
            images,
            index: None,
        }
    }

    /// Show image `index`; out of range indices are ignored
    pub fn open(&mut self, index: usize) {
        if index < self.images.len() {
            self.index = Some(index);
        }
    }

    pub fn next(&mut self) {
        let len = self.images.len();
        if let Some(i) = self.index.as_mut() {
            *i = (*i + 1) % len;
        }
    }

    pub fn prev(&mut self) {
        let len = self.images.len();
        if let Some(i) = self.index.as_mut() {
            *i = (*i + len - 1) % len;
        }
    }

    pub fn close(&mut self) {
        self.index = None;
    }

    pub fn is_open(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Image currently shown
    pub fn current(&self) -> Option<&str> {
        self.index.map(|i| self.images[i].as_str())
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }
}
