use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout::{layout_index, unlayout_index, InnerOrder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleError {
    #[error("dimension '{name}' not found in tuple ({tuple})")]
    UnknownDim { name: String, tuple: String },

    #[error("dimension '{name}' already exists in tuple ({tuple})")]
    DuplicateDim { name: String, tuple: String },

    #[error("position {posn} out of range for tuple with {num_dims} dimensions")]
    PosnOutOfRange { posn: usize, num_dims: usize },

    #[error("dimension mismatch: ({lhs}) vs ({rhs})")]
    DimMismatch { lhs: String, rhs: String },

    #[error("coordinate {value} in dimension '{name}' not in [0, {size})")]
    CoordOutOfRange { name: String, value: i64, size: i64 },

    #[error("linear index {index} out of range for {total} points")]
    IndexOutOfRange { index: usize, total: usize },
}

/// One named dimension and its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim {
    name: String,
    val: i64,
}

impl Dim {
    pub fn new(name: impl Into<String>, val: i64) -> Self {
        Self { name: name.into(), val }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn val(&self) -> i64 {
        self.val
    }
}

/// Ordered set of uniquely named integer dimensions.
///
/// The inner order is fixed when the tuple is created and is inherited by
/// every tuple derived from it (arithmetic results, unlayout results, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuple {
    dims: Vec<Dim>,
    order: InnerOrder,
}

impl Tuple {
    pub fn new(order: InnerOrder) -> Self {
        Self {
            dims: Vec::new(),
            order,
        }
    }

    /// Build from `(name, value)` pairs in order.
    pub fn from_pairs<S: Into<String>>(
        order: InnerOrder,
        pairs: impl IntoIterator<Item = (S, i64)>,
    ) -> Result<Self, TupleError> {
        let mut t = Tuple::new(order);
        for (name, val) in pairs {
            t.add_dim_back(name, val)?;
        }
        Ok(t)
    }

    /// Build from names that are already unique, e.g. taken from another
    /// tuple or a grid's dimension table.
    pub(crate) fn from_unique_names(
        order: InnerOrder,
        pairs: impl IntoIterator<Item = (String, i64)>,
    ) -> Self {
        let dims: Vec<Dim> = pairs.into_iter().map(|(name, val)| Dim { name, val }).collect();
        debug_assert!(dims
            .iter()
            .enumerate()
            .all(|(i, d)| dims[..i].iter().all(|p| p.name != d.name)));
        Self { dims, order }
    }

    pub fn inner_order(&self) -> InnerOrder {
        self.order
    }

    pub fn is_first_inner(&self) -> bool {
        self.order.is_first_inner()
    }

    /// Override the ordering of this instance only.
    pub fn set_inner_order(&mut self, order: InnerOrder) {
        self.order = order;
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.dims.iter().map(|d| d.name.as_str())
    }

    pub fn vals(&self) -> Vec<i64> {
        self.dims.iter().map(|d| d.val).collect()
    }

    pub fn lookup_posn(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup_posn(name).is_some()
    }

    fn posn(&self, name: &str) -> Result<usize, TupleError> {
        self.lookup_posn(name).ok_or_else(|| TupleError::UnknownDim {
            name: name.to_string(),
            tuple: self.dim_val_str(),
        })
    }

    fn check_new(&self, name: &str) -> Result<(), TupleError> {
        if self.contains(name) {
            return Err(TupleError::DuplicateDim {
                name: name.to_string(),
                tuple: self.dim_val_str(),
            });
        }
        Ok(())
    }

    pub fn add_dim_back(&mut self, name: impl Into<String>, val: i64) -> Result<(), TupleError> {
        let name = name.into();
        self.check_new(&name)?;
        self.dims.push(Dim { name, val });
        Ok(())
    }

    pub fn add_dim_front(&mut self, name: impl Into<String>, val: i64) -> Result<(), TupleError> {
        let name = name.into();
        self.check_new(&name)?;
        self.dims.insert(0, Dim { name, val });
        Ok(())
    }

    pub fn val(&self, name: &str) -> Result<i64, TupleError> {
        Ok(self.dims[self.posn(name)?].val)
    }

    pub fn val_at(&self, posn: usize) -> Result<i64, TupleError> {
        self.dim_at(posn).map(|d| d.val)
    }

    pub fn dim_at(&self, posn: usize) -> Result<&Dim, TupleError> {
        self.dims.get(posn).ok_or(TupleError::PosnOutOfRange {
            posn,
            num_dims: self.dims.len(),
        })
    }

    pub fn set_val(&mut self, name: &str, val: i64) -> Result<(), TupleError> {
        let posn = self.posn(name)?;
        self.dims[posn].val = val;
        Ok(())
    }

    pub fn set_val_at(&mut self, posn: usize, val: i64) -> Result<(), TupleError> {
        let num_dims = self.dims.len();
        let d = self
            .dims
            .get_mut(posn)
            .ok_or(TupleError::PosnOutOfRange { posn, num_dims })?;
        d.val = val;
        Ok(())
    }

    /// Overwrite values from `other` by name. With `must_exist`, every
    /// dimension of `other` has to be present here; otherwise unknown
    /// names are skipped.
    pub fn set_vals(&mut self, other: &Tuple, must_exist: bool) -> Result<(), TupleError> {
        for d in &other.dims {
            match self.lookup_posn(&d.name) {
                Some(posn) => self.dims[posn].val = d.val,
                None if must_exist => {
                    return Err(TupleError::UnknownDim {
                        name: d.name.clone(),
                        tuple: self.dim_val_str(),
                    })
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Overwrite values positionally; `vals` must have one entry per dim.
    pub fn set_vals_from(&mut self, vals: &[i64]) -> Result<(), TupleError> {
        if vals.len() != self.dims.len() {
            return Err(TupleError::PosnOutOfRange {
                posn: vals.len(),
                num_dims: self.dims.len(),
            });
        }
        for (d, v) in self.dims.iter_mut().zip(vals) {
            d.val = *v;
        }
        Ok(())
    }

    /// Product of all values; the number of points in `[0, val)^n`.
    pub fn product(&self) -> i64 {
        self.dims.iter().map(|d| d.val).product()
    }

    pub fn same_dims(&self, other: &Tuple) -> bool {
        self.dims.len() == other.dims.len()
            && self.dims.iter().zip(&other.dims).all(|(a, b)| a.name == b.name)
    }

    /* ---------- elementwise arithmetic ---------- */

    fn combine(&self, rhs: &Tuple, f: impl Fn(i64, i64) -> i64) -> Result<Tuple, TupleError> {
        if !self.same_dims(rhs) {
            return Err(TupleError::DimMismatch {
                lhs: self.dim_val_str(),
                rhs: rhs.dim_val_str(),
            });
        }
        let dims = self
            .dims
            .iter()
            .zip(&rhs.dims)
            .map(|(a, b)| Dim {
                name: a.name.clone(),
                val: f(a.val, b.val),
            })
            .collect();
        Ok(Tuple {
            dims,
            order: self.order,
        })
    }

    pub fn add(&self, rhs: &Tuple) -> Result<Tuple, TupleError> {
        self.combine(rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Tuple) -> Result<Tuple, TupleError> {
        self.combine(rhs, |a, b| a - b)
    }

    pub fn mult(&self, rhs: &Tuple) -> Result<Tuple, TupleError> {
        self.combine(rhs, |a, b| a * b)
    }

    /// Add `n` to every value.
    pub fn add_scalar(&self, n: i64) -> Tuple {
        let mut t = self.clone();
        t.dims.iter_mut().for_each(|d| d.val += n);
        t
    }

    /* ---------- layout ---------- */

    /// Linear index of `coord` within the box whose extents are `self`.
    ///
    /// `coord` may name a subset of this tuple's dims (missing ones are 0),
    /// but every name it carries must exist here.
    pub fn layout(&self, coord: &Tuple) -> Result<usize, TupleError> {
        let mut crd = vec![0i64; self.dims.len()];
        for d in &coord.dims {
            let posn = self.posn(&d.name)?;
            crd[posn] = d.val;
        }
        let sizes = self.vals();
        for (i, (c, s)) in crd.iter().zip(&sizes).enumerate() {
            if *c < 0 || c >= s {
                return Err(TupleError::CoordOutOfRange {
                    name: self.dims[i].name.clone(),
                    value: *c,
                    size: *s,
                });
            }
        }
        Ok(layout_index(&sizes, &crd, self.order))
    }

    /// Coordinate whose [`layout`](Self::layout) is `index`.
    pub fn unlayout(&self, index: usize) -> Result<Tuple, TupleError> {
        let total = self.product().max(0) as usize;
        if index >= total {
            return Err(TupleError::IndexOutOfRange { index, total });
        }
        let mut crd = vec![0i64; self.dims.len()];
        unlayout_index(&self.vals(), index, self.order, &mut crd);
        let mut t = self.clone();
        for (d, v) in t.dims.iter_mut().zip(crd) {
            d.val = v;
        }
        Ok(t)
    }

    /// Format like "x=3, y=4".
    pub fn dim_val_str(&self) -> String {
        self.make_str(", ", "=", "", "")
    }

    pub fn make_str(&self, separator: &str, infix: &str, prefix: &str, suffix: &str) -> String {
        self.dims
            .iter()
            .map(|d| format!("{prefix}{}{infix}{}{suffix}", d.name, d.val))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// Equality ignores the inner order: same names, same values, same order.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
    }
}

impl Eq for Tuple {}

impl Ord for Tuple {
    /// More dims wins, then larger product, then (name, value) pairs
    /// lexicographically.
    fn cmp(&self, other: &Self) -> Ordering {
        self.dims
            .len()
            .cmp(&other.dims.len())
            .then_with(|| self.product().cmp(&other.product()))
            .then_with(|| {
                self.dims
                    .iter()
                    .map(|d| (&d.name, d.val))
                    .cmp(other.dims.iter().map(|d| (&d.name, d.val)))
            })
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dim_val_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(order: InnerOrder, x: i64, y: i64) -> Tuple {
        Tuple::from_pairs(order, [("x", x), ("y", y)]).unwrap()
    }

    #[test]
    fn lookup_by_name_and_posn() {
        let t = xy(InnerOrder::FirstInner, 3, 4);
        assert_eq!(t.num_dims(), 2);
        assert_eq!(t.val_at(0).unwrap(), 3);
        assert_eq!(t.val_at(1).unwrap(), 4);
        assert_eq!(t.val("x").unwrap(), 3);
        assert_eq!(t.val("y").unwrap(), 4);
        assert!(matches!(t.val("z"), Err(TupleError::UnknownDim { .. })));
        assert!(matches!(t.val_at(2), Err(TupleError::PosnOutOfRange { .. })));
        assert_eq!(t.to_string(), "x=3, y=4");
    }

    #[test]
    fn duplicate_dim_rejected() {
        let mut t = xy(InnerOrder::FirstInner, 3, 4);
        assert!(matches!(
            t.add_dim_front("x", 1),
            Err(TupleError::DuplicateDim { .. })
        ));
        t.add_dim_front("a", 1).unwrap();
        assert_eq!(t.names().collect::<Vec<_>>(), vec!["a", "x", "y"]);
    }

    #[test]
    fn ordering() {
        let t1 = xy(InnerOrder::FirstInner, 3, 4);
        let mut t2 = t1.clone();
        assert_eq!(t2, t1);
        t2.set_val("x", 2).unwrap();
        assert!(t2 < t1);
        t2.set_val("x", 4).unwrap();
        assert!(t2 > t1);

        let mut t3 = t1.clone();
        t3.add_dim_front("a", 1).unwrap();
        assert!(t3 > t1);

        let t4 = Tuple::from_pairs(InnerOrder::FirstInner, [("x", 3), ("z", 4)]).unwrap();
        assert!(t4 > t1);
    }

    #[test]
    fn arithmetic_requires_same_dims() {
        let a = xy(InnerOrder::FirstInner, 3, 4);
        let b = xy(InnerOrder::FirstInner, 1, 2);
        assert_eq!(a.add(&b).unwrap(), xy(InnerOrder::FirstInner, 4, 6));
        assert_eq!(a.sub(&b).unwrap(), xy(InnerOrder::FirstInner, 2, 2));
        assert_eq!(a.mult(&b).unwrap(), xy(InnerOrder::FirstInner, 3, 8));
        assert_eq!(b.add_scalar(1), xy(InnerOrder::FirstInner, 2, 3));

        let c = Tuple::from_pairs(InnerOrder::FirstInner, [("x", 1), ("z", 2)]).unwrap();
        assert!(matches!(a.add(&c), Err(TupleError::DimMismatch { .. })));
    }

    #[test]
    fn set_vals_must_exist() {
        let mut a = xy(InnerOrder::FirstInner, 3, 4);
        let b = Tuple::from_pairs(InnerOrder::FirstInner, [("y", 9), ("z", 1)]).unwrap();
        assert!(a.set_vals(&b, true).is_err());
        a.set_vals(&b, false).unwrap();
        assert_eq!(a, xy(InnerOrder::FirstInner, 3, 9));
    }

    #[test]
    fn layout_loop_first_inner() {
        let t1 = xy(InnerOrder::FirstInner, 3, 4);
        let mut j = 0;
        for y in 0..4 {
            for x in 0..3 {
                let ofs = xy(InnerOrder::FirstInner, x, y);
                let i = t1.layout(&ofs).unwrap();
                assert_eq!(i, j);
                assert_eq!(t1.unlayout(i).unwrap(), ofs);
                j += 1;
            }
        }
        assert_eq!(j as i64, t1.product());
    }

    #[test]
    fn layout_loop_last_inner() {
        let t1 = xy(InnerOrder::LastInner, 3, 4);
        let mut j = 0;
        for x in 0..3 {
            for y in 0..4 {
                let ofs = xy(InnerOrder::LastInner, x, y);
                assert_eq!(t1.layout(&ofs).unwrap(), j);
                j += 1;
            }
        }
    }

    #[test]
    fn layout_subset_and_range() {
        let t1 = xy(InnerOrder::FirstInner, 3, 4);
        let only_y = Tuple::from_pairs(InnerOrder::FirstInner, [("y", 2)]).unwrap();
        assert_eq!(t1.layout(&only_y).unwrap(), 6);
        assert!(matches!(
            t1.layout(&xy(InnerOrder::FirstInner, 3, 0)),
            Err(TupleError::CoordOutOfRange { .. })
        ));
        assert!(matches!(
            t1.unlayout(12),
            Err(TupleError::IndexOutOfRange { index: 12, total: 12 })
        ));
    }

    #[test]
    fn from_unique_names_keeps_order() {
        let t = Tuple::from_unique_names(
            InnerOrder::LastInner,
            [("x".to_string(), 3), ("y".to_string(), 4)],
        );
        assert_eq!(t, xy(InnerOrder::LastInner, 3, 4));
        assert_eq!(t.inner_order(), InnerOrder::LastInner);
    }
}
