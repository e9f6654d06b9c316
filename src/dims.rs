use serde::{Deserialize, Serialize};

use crate::dim::{Attr, DimKind};
use crate::error::{GridError, Result};
use crate::layout::InnerOrder;
use crate::tuple::{Tuple, TupleError};

fn round_up(n: i64, mult: i64) -> i64 {
    (n + mult - 1) / mult * mult
}

/// Sizing metadata for one grid dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimInfo {
    pub name: String,
    pub kind: DimKind,
    /// Logical extent (rank domain, misc range, or step count).
    pub domain: i64,
    pub halo: i64,
    /// Reserved cells on each side; `>= halo`, a multiple of `fold`.
    pub pad: i64,
    /// Vector-fold length; 1 for unfolded dims.
    pub fold: i64,
    /// Logical index of the first domain (or misc) element.
    pub offset: i64,
    /// `round_up(domain + 2 * pad, fold)`.
    pub alloc: i64,
}

impl DimInfo {
    pub fn new(name: impl Into<String>, kind: DimKind) -> Self {
        Self {
            name: name.into(),
            kind,
            domain: 1,
            halo: 0,
            pad: 0,
            fold: 1,
            offset: 0,
            alloc: 1,
        }
    }

    pub fn first_allowed(&self) -> i64 {
        self.offset - self.pad
    }

    pub fn last_allowed(&self) -> i64 {
        self.offset - self.pad + self.alloc - 1
    }
}

/// Per-dimension table of a grid: kinds, sizes and the resize rule.
///
/// Once `storage_attached` is set, any change that alters an allocation
/// size is rejected and the table is left as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    grid_name: String,
    dims: Vec<DimInfo>,
    order: InnerOrder,
    storage_attached: bool,
}

impl GridDims {
    pub fn new(grid_name: impl Into<String>, dims: Vec<DimInfo>, order: InnerOrder) -> Result<Self> {
        let mut table = Self {
            grid_name: grid_name.into(),
            dims: Vec::with_capacity(dims.len()),
            order,
            storage_attached: false,
        };
        let mut names = Tuple::new(order);
        for d in dims {
            names.add_dim_back(d.name.clone(), 0)?;
            if d.fold < 1 || (d.kind != DimKind::Domain && d.fold != 1) {
                return Err(GridError::InvalidFold {
                    grid: table.grid_name.clone(),
                    dim: d.name,
                    fold: d.fold,
                });
            }
            let size_attr = match d.kind {
                DimKind::Domain => Attr::DomainSize,
                _ => Attr::AllocSize,
            };
            table.at_least(size_attr, &d.name, d.domain, Self::min_size(d.kind))?;
            table.at_least(Attr::HaloSize, &d.name, d.halo, 0)?;
            table.at_least(Attr::PadSize, &d.name, d.pad, 0)?;
            table.dims.push(d);
        }
        table.update(|_| Ok(()))?;
        Ok(table)
    }

    pub fn grid_name(&self) -> &str {
        &self.grid_name
    }

    pub fn inner_order(&self) -> InnerOrder {
        self.order
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[DimInfo] {
        &self.dims
    }

    pub fn dim_at(&self, posn: usize) -> Result<&DimInfo> {
        self.dims.get(posn).ok_or_else(|| {
            TupleError::PosnOutOfRange {
                posn,
                num_dims: self.dims.len(),
            }
            .into()
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.dims.iter().map(|d| d.name.as_str())
    }

    pub fn lookup_posn(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == dim)
    }

    pub fn is_storage_attached(&self) -> bool {
        self.storage_attached
    }

    pub(crate) fn set_storage_attached(&mut self, attached: bool) {
        self.storage_attached = attached;
    }

    /// Allocation extents as a tuple, in grid order.
    pub fn allocs(&self) -> Tuple {
        self.tuple_of(|d| d.alloc)
    }

    pub fn alloc_vals(&self) -> Vec<i64> {
        self.dims.iter().map(|d| d.alloc).collect()
    }

    /// A tuple with this grid's dim names, order, and `f` for values.
    pub fn tuple_of(&self, f: impl Fn(&DimInfo) -> i64) -> Tuple {
        Tuple::from_unique_names(self.order, self.dims.iter().map(|d| (d.name.clone(), f(d))))
    }

    pub fn num_storage_elements(&self) -> i64 {
        self.dims.iter().map(|d| d.alloc).product()
    }

    /// Position of `dim`, or an unknown-dimension error tagged with `op`.
    pub fn posn(&self, op: &'static str, dim: &str) -> Result<usize> {
        self.lookup_posn(dim).ok_or_else(|| GridError::UnknownDim {
            op,
            grid: self.grid_name.clone(),
            dim: dim.to_string(),
        })
    }

    fn checked(&self, attr: Attr, dim: &str, write: bool) -> Result<usize> {
        let posn = self.posn(attr.name(), dim)?;
        let kinds = if write { attr.write_kinds() } else { attr.kinds() };
        let kind = self.dims[posn].kind;
        if !kinds.allows(kind) {
            return Err(GridError::WrongKind {
                attr,
                grid: self.grid_name.clone(),
                dim: dim.to_string(),
                kind,
            });
        }
        Ok(posn)
    }

    /* ---------- getters ---------- */

    /// Read `attr` for `dim`, enforcing the attribute's kind rule.
    pub fn get(&self, attr: Attr, dim: &str) -> Result<i64> {
        let d = &self.dims[self.checked(attr, dim, false)?];
        Ok(match attr {
            Attr::DomainSize => d.domain,
            Attr::PadSize | Attr::MinPadSize => d.pad,
            Attr::HaloSize => d.halo,
            Attr::ExtraPadSize => d.pad - d.halo,
            Attr::FirstMiscIndex | Attr::FirstDomainIndex | Attr::Offset => d.offset,
            Attr::LastMiscIndex | Attr::LastDomainIndex => d.offset + d.domain - 1,
            Attr::FirstAllocIndex | Attr::FirstAllowedIndex => d.first_allowed(),
            Attr::LastAllocIndex | Attr::LastAllowedIndex => d.last_allowed(),
            Attr::AllocSize => d.alloc,
        })
    }

    /* ---------- setters ---------- */

    /// Step dims need at least one slot for indices to wrap into.
    fn min_size(kind: DimKind) -> i64 {
        match kind {
            DimKind::Step => 1,
            _ => 0,
        }
    }

    fn non_negative(&self, attr: Attr, dim: &str, n: i64) -> Result<()> {
        self.at_least(attr, dim, n, 0)
    }

    fn at_least(&self, attr: Attr, dim: &str, n: i64, min: i64) -> Result<()> {
        if n < min {
            return Err(GridError::InvalidValue {
                attr,
                grid: self.grid_name.clone(),
                dim: dim.to_string(),
                value: n,
            });
        }
        Ok(())
    }

    /// Apply `f` to a copy of the table, resize, and commit only on success.
    fn update(&mut self, f: impl FnOnce(&mut [DimInfo]) -> Result<()>) -> Result<()> {
        let mut next = self.dims.clone();
        f(&mut next)?;

        for d in next.iter_mut() {
            if d.kind != DimKind::Domain {
                d.pad = 0;
                d.halo = 0;
            }
            d.pad = round_up(d.pad.max(d.halo), d.fold);
            d.alloc = round_up(d.domain + 2 * d.pad, d.fold);
        }

        let changed = self.dims.iter().zip(&next).any(|(a, b)| a.alloc != b.alloc);
        if self.storage_attached && changed {
            let old_allocs = self.allocs().dim_val_str();
            let new_allocs = self.tuple_of_dims(&next).dim_val_str();
            return Err(GridError::ResizeAfterAlloc {
                grid: self.grid_name.clone(),
                old_allocs,
                new_allocs,
            });
        }
        if changed {
            tracing::debug!(
                grid = %self.grid_name,
                allocs = %self.tuple_of_dims(&next),
                "resized grid"
            );
        }
        self.dims = next;
        Ok(())
    }

    fn tuple_of_dims(&self, dims: &[DimInfo]) -> Tuple {
        Tuple::from_unique_names(self.order, dims.iter().map(|d| (d.name.clone(), d.alloc)))
    }

    pub fn set_domain_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::DomainSize, dim, true)?;
        self.non_negative(Attr::DomainSize, dim, n)?;
        self.update(|d| {
            d[posn].domain = n;
            Ok(())
        })
    }

    pub fn set_halo_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::HaloSize, dim, true)?;
        self.non_negative(Attr::HaloSize, dim, n)?;
        self.update(|d| {
            d[posn].halo = n;
            Ok(())
        })
    }

    /// Raise the pad to at least `n`; never shrinks it.
    pub fn set_min_pad_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::MinPadSize, dim, true)?;
        self.non_negative(Attr::MinPadSize, dim, n)?;
        self.update(|d| {
            d[posn].pad = d[posn].pad.max(n);
            Ok(())
        })
    }

    /// Ensure at least `n` cells of padding beyond the halo.
    pub fn set_extra_pad_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::ExtraPadSize, dim, true)?;
        self.non_negative(Attr::ExtraPadSize, dim, n)?;
        self.update(|d| {
            d[posn].pad = d[posn].pad.max(d[posn].halo + n);
            Ok(())
        })
    }

    /// Set the pad exactly (still raised to the halo and rounded to the fold).
    pub(crate) fn set_pad_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.posn("set_pad_size", dim)?;
        self.update(|d| {
            d[posn].pad = n;
            Ok(())
        })
    }

    pub fn set_first_misc_index(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::FirstMiscIndex, dim, true)?;
        self.dims[posn].offset = n;
        Ok(())
    }

    pub fn set_first_domain_index(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::FirstDomainIndex, dim, true)?;
        self.dims[posn].offset = n;
        Ok(())
    }

    /// Allocation along a step or misc dim; equal to its domain size.
    pub fn set_alloc_size(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::AllocSize, dim, true)?;
        self.at_least(Attr::AllocSize, dim, n, Self::min_size(self.dims[posn].kind))?;
        self.update(|d| {
            d[posn].domain = n;
            Ok(())
        })
    }

    pub fn set_offset(&mut self, dim: &str, n: i64) -> Result<()> {
        let posn = self.checked(Attr::Offset, dim, true)?;
        self.dims[posn].offset = n;
        Ok(())
    }

    /// Same names in the same order.
    pub fn same_names(&self, other: &GridDims) -> bool {
        self.dims.len() == other.dims.len()
            && self.dims.iter().zip(&other.dims).all(|(a, b)| a.name == b.name)
    }

    /// One-line description like
    /// "grid 'p' (t: step alloc=2; x: domain=8 halo=1 pad=4 fold=4 alloc=16)".
    pub fn info(&self) -> String {
        let dims = self
            .dims
            .iter()
            .map(|d| match d.kind {
                DimKind::Domain => format!(
                    "{}: domain={} halo={} pad={} fold={} alloc={}",
                    d.name, d.domain, d.halo, d.pad, d.fold, d.alloc
                ),
                kind => format!("{}: {kind} alloc={}", d.name, d.alloc),
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("grid '{}' ({dims})", self.grid_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txy() -> GridDims {
        let mut x = DimInfo::new("x", DimKind::Domain);
        x.fold = 4;
        GridDims::new(
            "p",
            vec![
                DimInfo::new("t", DimKind::Step),
                x,
                DimInfo::new("y", DimKind::Domain),
                DimInfo::new("m", DimKind::Misc),
            ],
            InnerOrder::FirstInner,
        )
        .unwrap()
    }

    #[test]
    fn pad_rounds_to_fold() {
        let mut g = txy();
        g.set_domain_size("x", 10).unwrap();
        g.set_halo_size("x", 1).unwrap();
        assert_eq!(g.get(Attr::PadSize, "x").unwrap(), 4);
        assert_eq!(g.get(Attr::AllocSize, "x").unwrap(), 20);
        assert_eq!(g.get(Attr::ExtraPadSize, "x").unwrap(), 3);

        g.set_halo_size("y", 2).unwrap();
        g.set_domain_size("y", 5).unwrap();
        assert_eq!(g.get(Attr::PadSize, "y").unwrap(), 2);
        assert_eq!(g.get(Attr::AllocSize, "y").unwrap(), 9);
    }

    #[test]
    fn min_and_extra_pad() {
        let mut g = txy();
        g.set_halo_size("y", 2).unwrap();
        g.set_min_pad_size("y", 1).unwrap();
        assert_eq!(g.get(Attr::PadSize, "y").unwrap(), 2);
        g.set_extra_pad_size("y", 3).unwrap();
        assert_eq!(g.get(Attr::PadSize, "y").unwrap(), 5);
        assert_eq!(g.get(Attr::ExtraPadSize, "y").unwrap(), 3);
    }

    #[test]
    fn kind_rules_enforced() {
        let mut g = txy();
        assert!(matches!(
            g.set_domain_size("t", 3),
            Err(GridError::WrongKind { kind: DimKind::Step, .. })
        ));
        assert!(matches!(
            g.get(Attr::HaloSize, "m"),
            Err(GridError::WrongKind { kind: DimKind::Misc, .. })
        ));
        assert!(matches!(
            g.set_alloc_size("x", 3),
            Err(GridError::WrongKind { .. })
        ));
        assert!(matches!(
            g.get(Attr::PadSize, "z"),
            Err(GridError::UnknownDim { .. })
        ));
        g.set_alloc_size("t", 3).unwrap();
        assert_eq!(g.get(Attr::AllocSize, "t").unwrap(), 3);
    }

    #[test]
    fn index_ranges() {
        let mut g = txy();
        g.set_domain_size("y", 6).unwrap();
        g.set_halo_size("y", 1).unwrap();
        g.set_first_domain_index("y", 10).unwrap();
        assert_eq!(g.get(Attr::FirstDomainIndex, "y").unwrap(), 10);
        assert_eq!(g.get(Attr::LastDomainIndex, "y").unwrap(), 15);
        assert_eq!(g.get(Attr::FirstAllocIndex, "y").unwrap(), 9);
        assert_eq!(g.get(Attr::LastAllocIndex, "y").unwrap(), 16);

        g.set_alloc_size("m", 4).unwrap();
        g.set_first_misc_index("m", -2).unwrap();
        assert_eq!(g.get(Attr::FirstMiscIndex, "m").unwrap(), -2);
        assert_eq!(g.get(Attr::LastMiscIndex, "m").unwrap(), 1);
    }

    #[test]
    fn resize_rejected_after_attach() {
        let mut g = txy();
        g.set_domain_size("y", 6).unwrap();
        g.set_halo_size("x", 1).unwrap();
        g.set_storage_attached(true);
        let before = g.clone();

        assert!(matches!(
            g.set_halo_size("y", 2),
            Err(GridError::ResizeAfterAlloc { .. })
        ));
        assert_eq!(g, before);

        // Halo within the existing pad leaves the allocation alone.
        g.set_halo_size("x", 3).unwrap();
        assert_eq!(g.get(Attr::PadSize, "x").unwrap(), 4);
        assert_eq!(
            g.get(Attr::AllocSize, "x").unwrap(),
            before.get(Attr::AllocSize, "x").unwrap()
        );
    }

    #[test]
    fn negative_sizes_rejected() {
        let mut g = txy();
        assert!(matches!(
            g.set_domain_size("x", -1),
            Err(GridError::InvalidValue { .. })
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let r = GridDims::new(
            "p",
            vec![DimInfo::new("x", DimKind::Domain), DimInfo::new("x", DimKind::Domain)],
            InnerOrder::FirstInner,
        );
        assert!(matches!(r, Err(GridError::Tuple(_))));
    }

    #[test]
    fn step_alloc_must_leave_a_slot() {
        let mut g = txy();
        assert!(matches!(
            g.set_alloc_size("t", 0),
            Err(GridError::InvalidValue { attr: Attr::AllocSize, value: 0, .. })
        ));
        assert_eq!(g.get(Attr::AllocSize, "t").unwrap(), 1);
        g.set_alloc_size("m", 0).unwrap();
        assert_eq!(g.num_storage_elements(), 0);
    }

    #[test]
    fn new_validates_entries() {
        let mut bad_halo = DimInfo::new("x", DimKind::Domain);
        bad_halo.halo = -2;
        assert!(matches!(
            GridDims::new("p", vec![bad_halo], InnerOrder::FirstInner),
            Err(GridError::InvalidValue { attr: Attr::HaloSize, value: -2, .. })
        ));

        let mut bad_domain = DimInfo::new("x", DimKind::Domain);
        bad_domain.domain = -1;
        assert!(matches!(
            GridDims::new("p", vec![bad_domain], InnerOrder::FirstInner),
            Err(GridError::InvalidValue { attr: Attr::DomainSize, .. })
        ));

        let mut empty_step = DimInfo::new("t", DimKind::Step);
        empty_step.domain = 0;
        assert!(matches!(
            GridDims::new("p", vec![empty_step], InnerOrder::FirstInner),
            Err(GridError::InvalidValue { attr: Attr::AllocSize, .. })
        ));

        let mut x = DimInfo::new("x", DimKind::Domain);
        x.domain = 5;
        x.halo = 2;
        let g = GridDims::new("p", vec![x], InnerOrder::FirstInner).unwrap();
        assert_eq!(g.get(Attr::AllocSize, "x").unwrap(), 9);
    }

    #[test]
    fn dim_at_checks_position() {
        let g = txy();
        assert_eq!(g.dim_at(1).unwrap().name, "x");
        assert!(matches!(
            g.dim_at(4),
            Err(GridError::Tuple(TupleError::PosnOutOfRange { posn: 4, num_dims: 4 }))
        ));
    }
}
