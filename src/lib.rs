pub mod dim;
pub mod dims;
pub mod tuple;
pub mod layout;
pub mod layout_iter;

pub mod config;
pub mod element;
pub mod error;

pub mod grid;
pub mod slice;
pub mod compare;
pub mod handle;

pub use compare::{Comparison, Mismatch};
pub use config::{EngineConfig, Tolerance};
pub use dim::{Attr, DimKind};
pub use error::{GridError, OrExit};
pub use grid::{Grid, GridBuilder, StorageState};
pub use handle::DynGrid;
pub use layout::InnerOrder;
pub use tuple::{Tuple, TupleError};
