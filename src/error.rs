use crate::dim::{Attr, DimKind};
use crate::tuple::TupleError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("{op}: dimension '{dim}' is not used in grid '{grid}'")]
    UnknownDim {
        op: &'static str,
        grid: String,
        dim: String,
    },

    #[error("{attr}: not allowed for {kind} dimension '{dim}' in grid '{grid}'")]
    WrongKind {
        attr: Attr,
        grid: String,
        dim: String,
        kind: DimKind,
    },

    #[error("{op}: called with {got} indices instead of {expected} for grid '{grid}'")]
    Arity {
        op: &'static str,
        grid: String,
        got: usize,
        expected: usize,
    },

    #[error("{op}: index in dim '{dim}' of grid '{grid}' is {index}, which is not in [{first}...{last}]")]
    IndexOutOfRange {
        op: &'static str,
        grid: String,
        dim: String,
        index: i64,
        first: i64,
        last: i64,
    },

    #[error("attempt to change allocation of grid '{grid}' from ({old_allocs}) to ({new_allocs}) after storage has been allocated")]
    ResizeAfterAlloc {
        grid: String,
        old_allocs: String,
        new_allocs: String,
    },

    #[error("{op}: no storage allocated for grid '{grid}'")]
    NotAllocated { op: &'static str, grid: String },

    #[error("storage already allocated for grid '{grid}'")]
    AlreadyAllocated { grid: String },

    #[error("{op}: incompatible grids '{grid}' and '{other}': {reason}")]
    Incompatible {
        op: &'static str,
        grid: String,
        other: String,
        reason: String,
    },

    #[error("source grid '{source_grid}' has pad {pad} in dim '{dim}', which is insufficient for grid '{grid}' with halo {halo}")]
    HaloExceedsPad {
        grid: String,
        source_grid: String,
        dim: String,
        halo: i64,
        pad: i64,
    },

    #[error("{op}: slice [{first}...{last}] in dim '{dim}' of grid '{grid}' spans more than {max} elements")]
    SliceTooLarge {
        op: &'static str,
        grid: String,
        dim: String,
        first: i64,
        last: i64,
        max: i64,
    },

    #[error("{op}: buffer holds {got} elements but the slice of grid '{grid}' has {expected}")]
    BufferSize {
        op: &'static str,
        grid: String,
        got: usize,
        expected: usize,
    },

    #[error("{op}: grids '{grid}' and '{other}' hold different element types")]
    ElementTypeMismatch {
        op: &'static str,
        grid: String,
        other: String,
    },

    #[error("grid '{grid}' does not hold {expected} elements")]
    WrongElementType { grid: String, expected: &'static str },

    #[error("grid '{grid}' has {num_dims} dimensions; positional access supports at most {max}")]
    TooManyPositional {
        grid: String,
        num_dims: usize,
        max: usize,
    },

    #[error("invalid {attr} {value} for dim '{dim}' in grid '{grid}'")]
    InvalidValue {
        attr: Attr,
        grid: String,
        dim: String,
        value: i64,
    },

    #[error("fold length {fold} is not allowed for dim '{dim}' in grid '{grid}'")]
    InvalidFold { grid: String, dim: String, fold: i64 },

    #[error(transparent)]
    Tuple(#[from] TupleError),
}

pub type Result<T, E = GridError> = std::result::Result<T, E>;

/// Boundary policy for configuration errors: log and terminate.
///
/// Library code returns [`GridError`]; hosts that want the classic
/// fail-fast behavior call `.or_exit()` at their outermost layer.
pub trait OrExit<T> {
    fn or_exit(self) -> T;
}

impl<T, E: std::fmt::Display> OrExit<T> for std::result::Result<T, E> {
    fn or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("{e}");
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
