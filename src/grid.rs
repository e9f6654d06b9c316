use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::dim::{Attr, DimKind};
use crate::dims::{DimInfo, GridDims};
use crate::element::Element;
use crate::error::{GridError, Result};
use crate::tuple::Tuple;

/// Shared element buffer. The lock only guards memory safety; ordering
/// between grids that alias one buffer is up to their users.
pub type Buffer<T> = Arc<RwLock<Vec<T>>>;

/// Most indices accepted by the positional element accessors.
pub const MAX_POSITIONAL_DIMS: usize = 6;

/// Who holds the storage behind a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Metadata only; sizes may still change freely.
    Unallocated,
    /// Sole holder of its buffer.
    Owned,
    /// Buffer aliased with at least one other grid.
    Shared,
}

/* ========================= Builder ========================= */

pub struct GridBuilder {
    name: String,
    dims: Vec<DimInfo>,
    config: EngineConfig,
}

impl GridBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dim(mut self, name: impl Into<String>, kind: DimKind) -> Self {
        self.dims.push(DimInfo::new(name, kind));
        self
    }

    pub fn step_dim(self, name: impl Into<String>) -> Self {
        self.dim(name, DimKind::Step)
    }

    pub fn domain_dim(self, name: impl Into<String>) -> Self {
        self.dim(name, DimKind::Domain)
    }

    pub fn misc_dim(self, name: impl Into<String>) -> Self {
        self.dim(name, DimKind::Misc)
    }

    /// Domain dim whose elements are grouped `fold` at a time in vectors.
    pub fn folded_domain_dim(mut self, name: impl Into<String>, fold: i64) -> Self {
        let mut d = DimInfo::new(name, DimKind::Domain);
        d.fold = fold;
        self.dims.push(d);
        self
    }

    pub fn build<T: Element>(self) -> Result<Grid<T>> {
        let dims = GridDims::new(self.name, self.dims, self.config.inner_order)?;
        Ok(Grid::from_dims(dims, self.config))
    }
}

/* ========================= Grid ========================= */

/// Named-dimension grid backed by a padded, possibly shared buffer.
#[derive(Debug)]
pub struct Grid<T: Element> {
    pub(crate) dims: GridDims,
    pub(crate) config: EngineConfig,
    pub(crate) storage: Option<Buffer<T>>,
    strides: Vec<usize>,
    dirty: bool,
}

impl<T: Element> Grid<T> {
    pub fn from_dims(dims: GridDims, config: EngineConfig) -> Self {
        Self {
            dims,
            config,
            storage: None,
            strides: Vec::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        self.dims.grid_name()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    pub fn num_dims(&self) -> usize {
        self.dims.num_dims()
    }

    pub fn dim_name(&self, posn: usize) -> Option<&str> {
        self.dims.dims().get(posn).map(|d| d.name.as_str())
    }

    pub fn is_dim_used(&self, dim: &str) -> bool {
        self.dims.lookup_posn(dim).is_some()
    }

    pub fn allocs(&self) -> Tuple {
        self.dims.allocs()
    }

    pub fn num_storage_elements(&self) -> i64 {
        self.dims.num_storage_elements()
    }

    pub fn num_storage_bytes(&self) -> i64 {
        self.num_storage_elements() * std::mem::size_of::<T>() as i64
    }

    /* ---------- per-dimension metadata ---------- */

    /// Read any attribute, subject to its dimension-kind rule.
    pub fn get(&self, attr: Attr, dim: &str) -> Result<i64> {
        self.dims.get(attr, dim)
    }

    pub fn domain_size(&self, dim: &str) -> Result<i64> {
        self.get(Attr::DomainSize, dim)
    }

    pub fn pad_size(&self, dim: &str) -> Result<i64> {
        self.get(Attr::PadSize, dim)
    }

    pub fn halo_size(&self, dim: &str) -> Result<i64> {
        self.get(Attr::HaloSize, dim)
    }

    pub fn extra_pad_size(&self, dim: &str) -> Result<i64> {
        self.get(Attr::ExtraPadSize, dim)
    }

    pub fn first_misc_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::FirstMiscIndex, dim)
    }

    pub fn last_misc_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::LastMiscIndex, dim)
    }

    pub fn first_domain_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::FirstDomainIndex, dim)
    }

    pub fn last_domain_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::LastDomainIndex, dim)
    }

    pub fn first_alloc_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::FirstAllocIndex, dim)
    }

    pub fn last_alloc_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::LastAllocIndex, dim)
    }

    pub fn alloc_size(&self, dim: &str) -> Result<i64> {
        self.get(Attr::AllocSize, dim)
    }

    pub fn offset(&self, dim: &str) -> Result<i64> {
        self.get(Attr::Offset, dim)
    }

    pub fn first_allowed_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::FirstAllowedIndex, dim)
    }

    pub fn last_allowed_index(&self, dim: &str) -> Result<i64> {
        self.get(Attr::LastAllowedIndex, dim)
    }

    pub fn set_domain_size(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_domain_size(dim, n)
    }

    pub fn set_halo_size(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_halo_size(dim, n)
    }

    pub fn set_min_pad_size(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_min_pad_size(dim, n)
    }

    pub fn set_extra_pad_size(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_extra_pad_size(dim, n)
    }

    pub fn set_first_misc_index(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_first_misc_index(dim, n)
    }

    pub fn set_first_domain_index(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_first_domain_index(dim, n)
    }

    pub fn set_alloc_size(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_alloc_size(dim, n)
    }

    pub fn set_offset(&mut self, dim: &str, n: i64) -> Result<()> {
        self.dims.set_offset(dim, n)
    }

    /* ---------- storage lifecycle ---------- */

    pub fn is_storage_allocated(&self) -> bool {
        self.storage.is_some()
    }

    pub fn storage_state(&self) -> StorageState {
        match &self.storage {
            None => StorageState::Unallocated,
            Some(buf) if Arc::strong_count(buf) > 1 => StorageState::Shared,
            Some(_) => StorageState::Owned,
        }
    }

    /// Allocate a zeroed buffer sized by the current metadata.
    pub fn alloc_storage(&mut self) -> Result<()> {
        if self.storage.is_some() {
            return Err(GridError::AlreadyAllocated {
                grid: self.name().to_string(),
            });
        }
        let n = self.num_storage_elements().max(0) as usize;
        tracing::debug!(
            grid = %self.name(),
            allocs = %self.allocs(),
            elements = n,
            "allocating grid storage"
        );
        self.attach(Arc::new(RwLock::new(vec![T::default(); n])));
        Ok(())
    }

    /// Drop this grid's reference to its buffer. The buffer itself is
    /// freed when its last holder lets go.
    pub fn release_storage(&mut self) {
        if let Some(buf) = self.storage.take() {
            tracing::debug!(
                grid = %self.name(),
                other_holders = Arc::strong_count(&buf) - 1,
                "releasing grid storage"
            );
        }
        self.dims.set_storage_attached(false);
        self.strides.clear();
    }

    pub(crate) fn attach(&mut self, buf: Buffer<T>) {
        self.strides = self.dims.inner_order().strides(&self.dims.alloc_vals());
        self.storage = Some(buf);
        self.dims.set_storage_attached(true);
    }

    /// Cached reductions over this grid are stale once it is written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /* ---------- indexing ---------- */

    /// Format indices like "x=5, y=3" using this grid's dim names.
    pub fn index_string(&self, indices: &[i64]) -> String {
        self.dims
            .names()
            .zip(indices)
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that every non-step index lies in its dim's allowed range.
    ///
    /// Returns `Ok(false)` for out-of-range indices unless `strict`, which
    /// turns them into an error. When `fixed` is given it receives a copy of
    /// `indices` clamped into range. Step indices always pass.
    pub fn check_indices(
        &self,
        indices: &[i64],
        strict: bool,
        fixed: Option<&mut Vec<i64>>,
    ) -> Result<bool> {
        self.check_indices_for("check_indices", indices, strict, fixed)
    }

    pub(crate) fn check_indices_for(
        &self,
        op: &'static str,
        indices: &[i64],
        strict: bool,
        mut fixed: Option<&mut Vec<i64>>,
    ) -> Result<bool> {
        if indices.len() != self.num_dims() {
            return Err(GridError::Arity {
                op,
                grid: self.name().to_string(),
                got: indices.len(),
                expected: self.num_dims(),
            });
        }
        if let Some(f) = fixed.as_deref_mut() {
            f.clear();
            f.extend_from_slice(indices);
        }

        let mut ok = true;
        for (i, (d, &idx)) in self.dims.dims().iter().zip(indices).enumerate() {
            // Step indices wrap around.
            if d.kind == DimKind::Step {
                continue;
            }
            let first = d.first_allowed();
            let last = d.last_allowed();
            if idx < first || idx > last {
                if strict {
                    return Err(GridError::IndexOutOfRange {
                        op,
                        grid: self.name().to_string(),
                        dim: d.name.clone(),
                        index: idx,
                        first,
                        last,
                    });
                }
                if let Some(f) = fixed.as_deref_mut() {
                    f[i] = idx.clamp(first, last.max(first));
                }
                ok = false;
            }
        }
        Ok(ok)
    }

    /// Buffer offset of in-range `indices`.
    pub(crate) fn storage_index(&self, indices: &[i64]) -> usize {
        self.dims
            .dims()
            .iter()
            .zip(indices)
            .zip(&self.strides)
            .map(|((d, &idx), &stride)| {
                let phys = match d.kind {
                    DimKind::Step => idx.rem_euclid(d.alloc.max(1)),
                    _ => idx - d.first_allowed(),
                };
                phys as usize * stride
            })
            .sum()
    }

    pub(crate) fn require_storage(&self, op: &'static str) -> Result<&Buffer<T>> {
        self.storage.as_ref().ok_or_else(|| GridError::NotAllocated {
            op,
            grid: self.name().to_string(),
        })
    }

    /* ---------- single elements ---------- */

    pub fn get_element(&self, indices: &[i64]) -> Result<T> {
        let buf = self.require_storage("get_element")?;
        self.check_indices_for("get_element", indices, true, None)?;
        let data = buf.read();
        Ok(data[self.storage_index(indices)])
    }

    /// Write one element. Returns the number of elements updated: 0 when no
    /// storage is attached or a non-strict check rejected the indices.
    pub fn set_element(&mut self, val: T, indices: &[i64], strict: bool) -> Result<usize> {
        let Some(buf) = self.storage.as_ref() else {
            return Ok(0);
        };
        if !self.check_indices_for("set_element", indices, strict, None)? {
            tracing::trace!(
                grid = %self.name(),
                indices = %self.index_string(indices),
                "set_element skipped out-of-range write"
            );
            return Ok(0);
        }
        buf.write()[self.storage_index(indices)] = val;
        self.dirty = true;
        Ok(1)
    }

    fn positional<'a>(&self, indices: &'a [i64; MAX_POSITIONAL_DIMS]) -> Result<&'a [i64]> {
        if self.num_dims() > MAX_POSITIONAL_DIMS {
            return Err(GridError::TooManyPositional {
                grid: self.name().to_string(),
                num_dims: self.num_dims(),
                max: MAX_POSITIONAL_DIMS,
            });
        }
        Ok(&indices[..self.num_dims()])
    }

    /// Positional form of [`get_element`](Self::get_element); indices past
    /// the grid's dim count are ignored.
    pub fn get_element_at(&self, indices: [i64; MAX_POSITIONAL_DIMS]) -> Result<T> {
        self.get_element(self.positional(&indices)?)
    }

    /// Positional form of [`set_element`](Self::set_element), non-strict.
    pub fn set_element_at(&mut self, val: T, indices: [i64; MAX_POSITIONAL_DIMS]) -> Result<usize> {
        let idx = self.positional(&indices)?.to_vec();
        self.set_element(val, &idx, false)
    }
}
