//! Lazy batched sample streams.
//!
//! Every reader in this crate produces its data as a pull-based iterator of
//! [`Batch`]es: the consumer pulls one batch at a time and end-of-stream
//! signals split completion. Shuffling is a bounded reservoir (capacity
//! [`SHUFFLE_BUFFER`]) applied to the sample stream before batching, so a
//! corpus never has to be buffered in full.
//!
//! The shuffle order is fully deterministic for a given seed, using the same
//! 64-bit Xorshift generator across the crate. Readers perturb the seed with
//! an epoch counter so that re-iterating the same reader produces a fresh
//! order, mirroring reshuffle-per-epoch training loops.

use ndarray::{Array2, Array3, Array4, Axis};

use crate::emotion::THREE_CLASS_MAP;

/// Reservoir capacity used by the stream shuffler.
pub const SHUFFLE_BUFFER: usize = 1024;

/// Boxed lazy stream of `(features, class id)` samples.
pub type SampleIter<T> = Box<dyn Iterator<Item = (T, u8)>>;

/// Boxed lazy stream of batches, the consumer-facing contract.
pub type BatchIter<T> = Box<dyn Iterator<Item = Batch<T>>>;

// ---------------------------------------------------------------------------
// Xorshift64 PRNG
// ---------------------------------------------------------------------------

/// Lightweight 64-bit Xorshift PRNG for deterministic shuffling and sampling.
///
/// Reproducible across platforms and requires no external crate in
/// production paths.
#[derive(Debug, Clone)]
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    /// Create a new PRNG. Seed `0` is replaced with a fixed non-zero value.
    pub fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { 0x853c49e6748fea9b } else { seed } }
    }

    /// Advance the state and return the next `u64`.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Return a uniformly distributed `usize` in `[0, n)`.
    #[inline]
    pub fn next_below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        (self.next_u64() % n as u64) as usize
    }

    /// Return a uniformly distributed `f32` in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Return a uniformly distributed `f32` in `[lo, hi)`.
    #[inline]
    pub fn next_f32_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f32() * (hi - lo)
    }

    /// In-place Fisher-Yates shuffle of `items`.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let n = items.len();
        for i in (1..n).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One pulled batch: per-sample feature values plus one-hot labels.
///
/// `labels` has shape `[len, num_classes]` with exactly one `1.0` per row.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    /// Feature values, one entry per sample.
    pub features: Vec<T>,
    /// One-hot labels, row `i` pairing with `features[i]`.
    pub labels: Array2<f32>,
}

impl<T> Batch<T> {
    /// Number of samples in this batch.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` when the batch holds no samples.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Argmax of each one-hot row, i.e. the integer class ids.
    pub fn label_ids(&self) -> Vec<u8> {
        self.labels
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0usize;
                for (i, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = i;
                    }
                }
                best as u8
            })
            .collect()
    }
}

impl Batch<Array2<f32>> {
    /// Stack the per-sample `(window, channels)` features into one
    /// `[len, window, channels]` tensor.
    ///
    /// # Panics
    ///
    /// Panics if the features do not all share one shape. Batches produced
    /// by this crate's readers always do; the panic only fires on a
    /// hand-assembled batch.
    pub fn stacked(&self) -> Array3<f32> {
        let views: Vec<_> = self.features.iter().map(|f| f.view()).collect();
        ndarray::stack(Axis(0), &views).expect("uniform window shapes")
    }
}

impl Batch<Array3<f32>> {
    /// Stack the per-sample `(h, w, channels)` features into one
    /// `[len, h, w, channels]` tensor.
    ///
    /// # Panics
    ///
    /// Panics if the features do not all share one shape. Batches produced
    /// by this crate's readers always do; the panic only fires on a
    /// hand-assembled batch.
    pub fn stacked(&self) -> Array4<f32> {
        let views: Vec<_> = self.features.iter().map(|f| f.view()).collect();
        ndarray::stack(Axis(0), &views).expect("uniform image shapes")
    }
}

// ---------------------------------------------------------------------------
// Reservoir shuffle
// ---------------------------------------------------------------------------

/// Bounded-buffer stream shuffler.
///
/// Keeps at most `capacity` pending items; each pull replaces a uniformly
/// chosen buffered item with the next upstream one. When `capacity` is at
/// least the stream length this degenerates to a full Fisher-Yates-quality
/// shuffle; otherwise it is a windowed approximation, which is the intended
/// trade-off.
pub struct ReservoirShuffle<I: Iterator> {
    inner: I,
    buffer: Vec<I::Item>,
    capacity: usize,
    rng: Xorshift64,
    exhausted: bool,
}

impl<I: Iterator> ReservoirShuffle<I> {
    /// Wrap `inner`, buffering up to `capacity` items, seeded by `seed`.
    pub fn new(inner: I, capacity: usize, seed: u64) -> Self {
        ReservoirShuffle {
            inner,
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            rng: Xorshift64::new(seed),
            exhausted: false,
        }
    }

    fn refill(&mut self) {
        while !self.exhausted && self.buffer.len() < self.capacity {
            match self.inner.next() {
                Some(item) => self.buffer.push(item),
                None => self.exhausted = true,
            }
        }
    }
}

impl<I: Iterator> Iterator for ReservoirShuffle<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.refill();
        if self.buffer.is_empty() {
            return None;
        }
        let j = self.rng.next_below(self.buffer.len());
        Some(self.buffer.swap_remove(j))
    }
}

// ---------------------------------------------------------------------------
// Batcher
// ---------------------------------------------------------------------------

/// Groups a sample stream into [`Batch`]es with one-hot labels.
///
/// The final batch may be smaller than `batch_size`; an exhausted upstream
/// ends the iterator.
pub struct Batcher<T> {
    inner: SampleIter<T>,
    batch_size: usize,
    num_classes: usize,
}

impl<T> Batcher<T> {
    /// Create a batcher over `inner` producing `[.., num_classes]` one-hot
    /// label rows.
    pub fn new(inner: SampleIter<T>, batch_size: usize, num_classes: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        assert!(num_classes > 0, "num_classes must be > 0");
        Batcher { inner, batch_size, num_classes }
    }
}

impl<T> Iterator for Batcher<T> {
    type Item = Batch<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut features = Vec::with_capacity(self.batch_size);
        let mut ids = Vec::with_capacity(self.batch_size);
        for (f, label) in self.inner.by_ref().take(self.batch_size) {
            features.push(f);
            ids.push(label);
        }
        if features.is_empty() {
            return None;
        }
        let mut labels = Array2::zeros((ids.len(), self.num_classes));
        for (row, &id) in ids.iter().enumerate() {
            debug_assert!((id as usize) < self.num_classes);
            labels[[row, id as usize]] = 1.0;
        }
        Some(Batch { features, labels })
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Remap a seven-class sample stream onto the frozen three-class taxonomy,
/// leaving features untouched.
pub fn remap_three<T: 'static>(samples: SampleIter<T>) -> SampleIter<T> {
    Box::new(samples.map(|(f, id)| (f, THREE_CLASS_MAP[id as usize])))
}

/// Materialise the label sequence of a batch stream by concatenating the
/// argmax of every one-hot row, in stream order.
pub fn collect_labels<T>(batches: impl Iterator<Item = Batch<T>>) -> Vec<u8> {
    let mut out = Vec::new();
    for batch in batches {
        out.extend(batch.label_ids());
    }
    out
}
