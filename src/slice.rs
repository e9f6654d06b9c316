use crate::element::Element;
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::layout::InnerOrder;
use crate::layout_iter::LayoutIterator;

/// Inclusive box `[first, last]` of a grid, walked in its own layout order.
struct SliceRegion {
    first: Vec<i64>,
    extents: Vec<i64>,
    num_points: usize,
}

impl SliceRegion {
    fn empty(first: &[i64]) -> Self {
        Self {
            first: first.to_vec(),
            extents: vec![0; first.len()],
            num_points: 0,
        }
    }

    fn num_points(&self) -> usize {
        self.num_points
    }

    /// `(grid indices, buffer position)` for every point of the region.
    fn points(&self, order: InnerOrder) -> impl Iterator<Item = (Vec<i64>, usize)> + '_ {
        LayoutIterator::new(self.extents.clone(), order).map(move |(ofs, i)| {
            let pt = self.first.iter().zip(&ofs).map(|(f, o)| f + o).collect();
            (pt, i)
        })
    }
}

impl<T: Element> Grid<T> {
    /// Resolve `[first, last]` against this grid. Every extent is bounded
    /// by its dim's allocation, so the point count never exceeds the
    /// buffer length.
    fn slice_region(
        &self,
        op: &'static str,
        first: &[i64],
        last: &[i64],
        strict: bool,
    ) -> Result<SliceRegion> {
        let mut first_fixed = Vec::new();
        let mut last_fixed = Vec::new();
        self.check_indices_for(op, first, strict, Some(&mut first_fixed))?;
        self.check_indices_for(op, last, strict, Some(&mut last_fixed))?;
        if self.num_storage_elements() == 0 {
            return Ok(SliceRegion::empty(&first_fixed));
        }

        let mut extents = Vec::with_capacity(first_fixed.len());
        let mut num_points = 1usize;
        for ((d, &f), &l) in self.dims.dims().iter().zip(&first_fixed).zip(&last_fixed) {
            let extent = if l < f {
                Some(0)
            } else {
                l.checked_sub(f).and_then(|n| n.checked_add(1))
            };
            let extent = match extent {
                Some(n) if n <= d.alloc => n,
                _ => {
                    return Err(GridError::SliceTooLarge {
                        op,
                        grid: self.name().to_string(),
                        dim: d.name.clone(),
                        first: f,
                        last: l,
                        max: d.alloc,
                    })
                }
            };
            num_points *= extent as usize;
            extents.push(extent);
        }
        Ok(SliceRegion {
            first: first_fixed,
            extents,
            num_points,
        })
    }

    fn check_buffer(&self, op: &'static str, region: &SliceRegion, got: usize) -> Result<()> {
        let expected = region.num_points();
        if got != expected {
            return Err(GridError::BufferSize {
                op,
                grid: self.name().to_string(),
                got,
                expected,
            });
        }
        Ok(())
    }

    /// Copy the inclusive region `[first, last]` into `buffer`, whose
    /// length must equal the region's point count. Element 0 of `buffer`
    /// is `first`; later elements follow the region's own layout order.
    pub fn get_elements_in_slice(&self, buffer: &mut [T], first: &[i64], last: &[i64]) -> Result<usize> {
        const OP: &str = "get_elements_in_slice";
        let buf = self.require_storage(OP)?;
        let region = self.slice_region(OP, first, last, true)?;
        self.check_buffer(OP, &region, buffer.len())?;

        let data = buf.read();
        let mut n = 0;
        for (pt, i) in region.points(self.dims().inner_order()) {
            buffer[i] = data[self.storage_index(&pt)];
            n += 1;
        }
        Ok(n)
    }

    /// Inverse of [`get_elements_in_slice`](Self::get_elements_in_slice).
    /// Returns 0 without touching anything if no storage is attached.
    pub fn set_elements_in_slice(&mut self, buffer: &[T], first: &[i64], last: &[i64]) -> Result<usize> {
        const OP: &str = "set_elements_in_slice";
        let Some(buf) = self.storage.as_ref() else {
            return Ok(0);
        };
        let region = self.slice_region(OP, first, last, true)?;
        self.check_buffer(OP, &region, buffer.len())?;

        let mut data = buf.write();
        let mut n = 0;
        for (pt, i) in region.points(self.dims().inner_order()) {
            data[self.storage_index(&pt)] = buffer[i];
            n += 1;
        }
        drop(data);
        if n > 0 {
            self.set_dirty(true);
        }
        Ok(n)
    }

    /// Write `val` to every point of `[first, last]`. Without `strict`,
    /// out-of-range bounds are clamped into the allocation first.
    pub fn set_elements_in_slice_same(
        &mut self,
        val: T,
        first: &[i64],
        last: &[i64],
        strict: bool,
    ) -> Result<usize> {
        const OP: &str = "set_elements_in_slice_same";
        let Some(buf) = self.storage.as_ref() else {
            return Ok(0);
        };
        let region = self.slice_region(OP, first, last, strict)?;

        let mut data = buf.write();
        let mut n = 0;
        for (pt, _) in region.points(self.dims().inner_order()) {
            data[self.storage_index(&pt)] = val;
            n += 1;
        }
        drop(data);
        if n > 0 {
            self.set_dirty(true);
        }
        Ok(n)
    }
}
