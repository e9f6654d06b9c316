use serde::{Deserialize, Serialize};

/// Which dimension (by insertion order) varies fastest in a linear layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InnerOrder {
    /// First-inserted dimension is unit stride (column-major for 2-D).
    #[default]
    FirstInner,
    /// Last-inserted dimension is unit stride (row-major for 2-D).
    LastInner,
}

impl InnerOrder {
    pub fn is_first_inner(self) -> bool {
        matches!(self, InnerOrder::FirstInner)
    }

    /// Dimension positions from slowest- to fastest-varying.
    pub fn outer_to_inner(self, ndims: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            InnerOrder::FirstInner => Box::new((0..ndims).rev()),
            InnerOrder::LastInner => Box::new(0..ndims),
        }
    }

    /// Dimension positions from fastest- to slowest-varying.
    pub fn inner_to_outer(self, ndims: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            InnerOrder::FirstInner => Box::new(0..ndims),
            InnerOrder::LastInner => Box::new((0..ndims).rev()),
        }
    }

    /// Per-dimension element strides for `sizes` under this ordering.
    pub fn strides(self, sizes: &[i64]) -> Vec<usize> {
        let mut stride = vec![0; sizes.len()];
        let mut acc = 1usize;
        for i in self.inner_to_outer(sizes.len()) {
            stride[i] = acc;
            acc *= sizes[i].max(0) as usize;
        }
        stride
    }
}

/* ---------- mixed-radix linearization ---------- */

/// Linear index of `coords` within a box of `sizes`.
///
/// Coordinates must satisfy `0 <= coords[i] < sizes[i]`; callers validate.
pub fn layout_index(sizes: &[i64], coords: &[i64], order: InnerOrder) -> usize {
    debug_assert_eq!(sizes.len(), coords.len());
    let mut idx = 0usize;
    for i in order.outer_to_inner(sizes.len()) {
        debug_assert!(coords[i] >= 0 && coords[i] < sizes[i]);
        idx = idx * sizes[i] as usize + coords[i] as usize;
    }
    idx
}

/// Inverse of [`layout_index`]; writes the coordinate into `out`.
pub fn unlayout_index(sizes: &[i64], mut idx: usize, order: InnerOrder, out: &mut [i64]) {
    debug_assert_eq!(sizes.len(), out.len());
    for i in order.inner_to_outer(sizes.len()) {
        let sz = sizes[i] as usize;
        out[i] = (idx % sz) as i64;
        idx /= sz;
    }
}
