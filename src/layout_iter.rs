use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::layout::{unlayout_index, InnerOrder};
use crate::tuple::Tuple;

/// Odometer over every point of a box, in layout order.
///
/// Yields `(coordinate, linear index)` where the index is exactly what
/// `layout` assigns to the coordinate.
pub struct LayoutIterator {
    sizes: Vec<i64>,
    order: InnerOrder,
    current: Vec<i64>,
    index: usize,
    end: usize,
}

impl LayoutIterator {
    pub fn new(sizes: Vec<i64>, order: InnerOrder) -> Self {
        let total = if sizes.iter().any(|s| *s <= 0) {
            0
        } else {
            sizes.iter().product::<i64>() as usize
        };
        Self::range(sizes, order, 0, total)
    }

    /// Iterate indices `[begin, end)` only.
    pub fn range(sizes: Vec<i64>, order: InnerOrder, begin: usize, end: usize) -> Self {
        let mut current = vec![0; sizes.len()];
        if begin < end {
            unlayout_index(&sizes, begin, order, &mut current);
        }
        Self {
            sizes,
            order,
            current,
            index: begin,
            end,
        }
    }
}

impl Iterator for LayoutIterator {
    type Item = (Vec<i64>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        let result = (self.current.clone(), self.index);
        self.index += 1;

        // Bump the fastest dim, carrying into slower ones.
        for i in self.order.inner_to_outer(self.sizes.len()) {
            self.current[i] += 1;
            if self.current[i] < self.sizes[i] {
                break;
            }
            self.current[i] = 0;
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.index);
        (n, Some(n))
    }
}

impl ExactSizeIterator for LayoutIterator {}

/// Number of contiguous index chunks handed to the rayon pool.
const CHUNKS_PER_THREAD: usize = 4;

impl Tuple {
    /// Iterate `[0, val)` in every dim, in layout order.
    pub fn points(&self) -> LayoutIterator {
        LayoutIterator::new(self.vals(), self.inner_order())
    }

    fn point_tuple(&self, crd: &[i64]) -> Tuple {
        Tuple::from_unique_names(
            self.inner_order(),
            self.names().map(str::to_string).zip(crd.iter().copied()),
        )
    }

    /// Call `visitor(coordinate, index)` for every point bounded by this
    /// tuple, in layout order. Stops early when `visitor` returns `false`.
    /// Returns `true` if every point was visited.
    pub fn visit_all_points<F>(&self, mut visitor: F) -> bool
    where
        F: FnMut(&Tuple, usize) -> bool,
    {
        for (crd, idx) in self.points() {
            if !visitor(&self.point_tuple(&crd), idx) {
                return false;
            }
        }
        true
    }

    /// Parallel form of [`visit_all_points`](Self::visit_all_points).
    ///
    /// The index range is split into contiguous chunks that run on the
    /// rayon pool. Each point gets the same index as in the sequential
    /// form, but calls across chunks are unordered, so `visitor` must
    /// synchronize any state it shares. A `false` return stops chunks at
    /// their next point; calls already in flight finish.
    pub fn visit_all_points_in_parallel<F>(&self, visitor: F) -> bool
    where
        F: Fn(&Tuple, usize) -> bool + Sync + Send,
    {
        let sizes = self.vals();
        let total = self.points().len();
        if total == 0 {
            return true;
        }
        let nchunks = (rayon::current_num_threads() * CHUNKS_PER_THREAD).clamp(1, total);
        let chunk_len = total.div_ceil(nchunks);
        let stop = AtomicBool::new(false);

        (0..nchunks).into_par_iter().for_each(|c| {
            let begin = c * chunk_len;
            let end = (begin + chunk_len).min(total);
            for (crd, idx) in LayoutIterator::range(sizes.clone(), self.inner_order(), begin, end) {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                if !visitor(&self.point_tuple(&crd), idx) {
                    stop.store(true, Ordering::Relaxed);
                    return;
                }
            }
        });

        !stop.load(Ordering::Relaxed)
    }
}
