use crate::compare::Comparison;
use crate::dim::Attr;
use crate::dims::GridDims;
use crate::element::Element;
use crate::error::{GridError, Result};
use crate::grid::{Grid, GridBuilder, StorageState, MAX_POSITIONAL_DIMS};

/// A grid of any supported element type, with an `f64` element API.
///
/// Cross-grid operations only combine grids of the same variant; anything
/// else is reported instead of converted.
#[derive(Debug)]
pub enum DynGrid {
    F32(Grid<f32>),
    F64(Grid<f64>),
}

macro_rules! dispatch {
    ($self:expr, $g:ident => $body:expr) => {
        match $self {
            DynGrid::F32($g) => $body,
            DynGrid::F64($g) => $body,
        }
    };
}

macro_rules! forward_getters {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self, dim: &str) -> Result<i64> {
                dispatch!(self, g => g.$name(dim))
            }
        )*
    };
}

macro_rules! forward_setters {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, dim: &str, n: i64) -> Result<()> {
                dispatch!(self, g => g.$name(dim, n))
            }
        )*
    };
}

fn read_slice<T: Element>(g: &Grid<T>, buffer: &mut [f64], first: &[i64], last: &[i64]) -> Result<usize> {
    let mut staged = vec![T::default(); buffer.len()];
    let n = g.get_elements_in_slice(&mut staged, first, last)?;
    for (out, v) in buffer.iter_mut().zip(staged) {
        *out = v.to_f64();
    }
    Ok(n)
}

fn write_slice<T: Element>(g: &mut Grid<T>, buffer: &[f64], first: &[i64], last: &[i64]) -> Result<usize> {
    let staged: Vec<T> = buffer.iter().map(|&v| T::from_f64(v)).collect();
    g.set_elements_in_slice(&staged, first, last)
}

impl From<Grid<f32>> for DynGrid {
    fn from(g: Grid<f32>) -> Self {
        DynGrid::F32(g)
    }
}

impl From<Grid<f64>> for DynGrid {
    fn from(g: Grid<f64>) -> Self {
        DynGrid::F64(g)
    }
}

impl GridBuilder {
    /// Build with single- or double-precision elements chosen at runtime.
    pub fn build_dyn(self, double_precision: bool) -> Result<DynGrid> {
        Ok(if double_precision {
            DynGrid::F64(self.build()?)
        } else {
            DynGrid::F32(self.build()?)
        })
    }
}

impl DynGrid {
    pub fn name(&self) -> &str {
        dispatch!(self, g => g.name())
    }

    pub fn num_dims(&self) -> usize {
        dispatch!(self, g => g.num_dims())
    }

    pub fn dims(&self) -> &GridDims {
        dispatch!(self, g => g.dims())
    }

    pub fn num_storage_elements(&self) -> i64 {
        dispatch!(self, g => g.num_storage_elements())
    }

    pub fn num_storage_bytes(&self) -> i64 {
        dispatch!(self, g => g.num_storage_bytes())
    }

    pub fn storage_state(&self) -> StorageState {
        dispatch!(self, g => g.storage_state())
    }

    pub fn is_dirty(&self) -> bool {
        dispatch!(self, g => g.is_dirty())
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        dispatch!(self, g => g.set_dirty(dirty))
    }

    pub fn get(&self, attr: Attr, dim: &str) -> Result<i64> {
        dispatch!(self, g => g.get(attr, dim))
    }

    forward_getters!(
        domain_size,
        pad_size,
        halo_size,
        extra_pad_size,
        first_misc_index,
        last_misc_index,
        first_domain_index,
        last_domain_index,
        first_alloc_index,
        last_alloc_index,
        alloc_size,
        offset,
        first_allowed_index,
        last_allowed_index,
    );

    forward_setters!(
        set_domain_size,
        set_halo_size,
        set_min_pad_size,
        set_extra_pad_size,
        set_first_misc_index,
        set_first_domain_index,
        set_alloc_size,
        set_offset,
    );

    pub fn check_indices(&self, indices: &[i64], strict: bool, fixed: Option<&mut Vec<i64>>) -> Result<bool> {
        dispatch!(self, g => g.check_indices(indices, strict, fixed))
    }

    pub fn element_bytes(&self) -> usize {
        match self {
            DynGrid::F32(_) => std::mem::size_of::<f32>(),
            DynGrid::F64(_) => std::mem::size_of::<f64>(),
        }
    }

    pub fn as_f32(&self) -> Result<&Grid<f32>> {
        match self {
            DynGrid::F32(g) => Ok(g),
            DynGrid::F64(g) => Err(GridError::WrongElementType {
                grid: g.name().to_string(),
                expected: "f32",
            }),
        }
    }

    pub fn as_f64(&self) -> Result<&Grid<f64>> {
        match self {
            DynGrid::F64(g) => Ok(g),
            DynGrid::F32(g) => Err(GridError::WrongElementType {
                grid: g.name().to_string(),
                expected: "f64",
            }),
        }
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut Grid<f32>> {
        match self {
            DynGrid::F32(g) => Ok(g),
            DynGrid::F64(g) => Err(GridError::WrongElementType {
                grid: g.name().to_string(),
                expected: "f32",
            }),
        }
    }

    pub fn as_f64_mut(&mut self) -> Result<&mut Grid<f64>> {
        match self {
            DynGrid::F64(g) => Ok(g),
            DynGrid::F32(g) => Err(GridError::WrongElementType {
                grid: g.name().to_string(),
                expected: "f64",
            }),
        }
    }

    pub fn alloc_storage(&mut self) -> Result<()> {
        dispatch!(self, g => g.alloc_storage())
    }

    pub fn release_storage(&mut self) {
        dispatch!(self, g => g.release_storage())
    }

    pub fn get_element(&self, indices: &[i64]) -> Result<f64> {
        dispatch!(self, g => g.get_element(indices).map(Element::to_f64))
    }

    pub fn set_element(&mut self, val: f64, indices: &[i64], strict: bool) -> Result<usize> {
        dispatch!(self, g => g.set_element(Element::from_f64(val), indices, strict))
    }

    pub fn get_element_at(&self, indices: [i64; MAX_POSITIONAL_DIMS]) -> Result<f64> {
        dispatch!(self, g => g.get_element_at(indices).map(Element::to_f64))
    }

    pub fn set_element_at(&mut self, val: f64, indices: [i64; MAX_POSITIONAL_DIMS]) -> Result<usize> {
        dispatch!(self, g => g.set_element_at(Element::from_f64(val), indices))
    }

    pub fn get_elements_in_slice(&self, buffer: &mut [f64], first: &[i64], last: &[i64]) -> Result<usize> {
        dispatch!(self, g => read_slice(g, buffer, first, last))
    }

    pub fn set_elements_in_slice(&mut self, buffer: &[f64], first: &[i64], last: &[i64]) -> Result<usize> {
        dispatch!(self, g => write_slice(g, buffer, first, last))
    }

    pub fn set_elements_in_slice_same(
        &mut self,
        val: f64,
        first: &[i64],
        last: &[i64],
        strict: bool,
    ) -> Result<usize> {
        dispatch!(self, g => g.set_elements_in_slice_same(Element::from_f64(val), first, last, strict))
    }

    pub fn is_storage_layout_identical(&self, other: &DynGrid) -> bool {
        match (self, other) {
            (DynGrid::F32(a), DynGrid::F32(b)) => a.is_storage_layout_identical(b),
            (DynGrid::F64(a), DynGrid::F64(b)) => a.is_storage_layout_identical(b),
            _ => false,
        }
    }

    pub fn share_storage(&mut self, source: &DynGrid) -> Result<()> {
        match (self, source) {
            (DynGrid::F32(a), DynGrid::F32(b)) => a.share_storage(b),
            (DynGrid::F64(a), DynGrid::F64(b)) => a.share_storage(b),
            (a, b) => Err(GridError::ElementTypeMismatch {
                op: "share_storage",
                grid: a.name().to_string(),
                other: b.name().to_string(),
            }),
        }
    }

    /// Grids of different element types never match element-wise.
    pub fn compare(&self, reference: &DynGrid, epsilon: f64, max_print: usize) -> Comparison {
        match (self, reference) {
            (DynGrid::F32(a), DynGrid::F32(b)) => a.compare(b, epsilon, max_print),
            (DynGrid::F64(a), DynGrid::F64(b)) => a.compare(b, epsilon, max_print),
            (a, b) => {
                tracing::warn!(
                    "mismatch: grids '{}' and '{}' hold different element types",
                    a.name(),
                    b.name()
                );
                Comparison {
                    mismatches: dispatch!(a, g => g.num_storage_elements()),
                    reported: Vec::new(),
                }
            }
        }
    }
}
