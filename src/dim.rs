use core::fmt;

use serde::{Deserialize, Serialize};

/// Role of a grid dimension, fixed when the grid is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimKind {
    /// Cyclic index (e.g. time) addressed modulo its allocation.
    Step,
    /// Spatial axis with halo, padding and vector folding.
    Domain,
    /// Auxiliary axis with plain first/last bounds.
    Misc,
}

impl fmt::Display for DimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimKind::Step => write!(f, "step"),
            DimKind::Domain => write!(f, "domain"),
            DimKind::Misc => write!(f, "misc"),
        }
    }
}

/// Set of dimension kinds an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kinds {
    pub step: bool,
    pub domain: bool,
    pub misc: bool,
}

impl Kinds {
    pub const ANY: Kinds = Kinds::new(true, true, true);
    pub const DOMAIN: Kinds = Kinds::new(false, true, false);
    pub const MISC: Kinds = Kinds::new(false, false, true);
    pub const DOMAIN_MISC: Kinds = Kinds::new(false, true, true);
    pub const STEP_MISC: Kinds = Kinds::new(true, false, true);

    pub const fn new(step: bool, domain: bool, misc: bool) -> Self {
        Self { step, domain, misc }
    }

    pub fn allows(self, kind: DimKind) -> bool {
        match kind {
            DimKind::Step => self.step,
            DimKind::Domain => self.domain,
            DimKind::Misc => self.misc,
        }
    }
}

/// Per-dimension attribute accessors, each gated by the kinds it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    DomainSize,
    PadSize,
    HaloSize,
    ExtraPadSize,
    MinPadSize,
    FirstMiscIndex,
    LastMiscIndex,
    FirstDomainIndex,
    LastDomainIndex,
    FirstAllocIndex,
    LastAllocIndex,
    AllocSize,
    Offset,
    FirstAllowedIndex,
    LastAllowedIndex,
}

impl Attr {
    /// Dimension kinds this attribute may be read or written for.
    pub fn kinds(self) -> Kinds {
        match self {
            Attr::DomainSize => Kinds::DOMAIN_MISC,
            Attr::PadSize
            | Attr::HaloSize
            | Attr::ExtraPadSize
            | Attr::MinPadSize
            | Attr::FirstDomainIndex
            | Attr::LastDomainIndex
            | Attr::FirstAllocIndex
            | Attr::LastAllocIndex => Kinds::DOMAIN,
            Attr::FirstMiscIndex | Attr::LastMiscIndex => Kinds::MISC,
            Attr::AllocSize | Attr::Offset | Attr::FirstAllowedIndex | Attr::LastAllowedIndex => {
                Kinds::ANY
            }
        }
    }

    /// Tighter rule for writes where it differs from reads.
    pub fn write_kinds(self) -> Kinds {
        match self {
            Attr::AllocSize => Kinds::STEP_MISC,
            other => other.kinds(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Attr::DomainSize => "domain_size",
            Attr::PadSize => "pad_size",
            Attr::HaloSize => "halo_size",
            Attr::ExtraPadSize => "extra_pad_size",
            Attr::MinPadSize => "min_pad_size",
            Attr::FirstMiscIndex => "first_misc_index",
            Attr::LastMiscIndex => "last_misc_index",
            Attr::FirstDomainIndex => "first_domain_index",
            Attr::LastDomainIndex => "last_domain_index",
            Attr::FirstAllocIndex => "first_alloc_index",
            Attr::LastAllocIndex => "last_alloc_index",
            Attr::AllocSize => "alloc_size",
            Attr::Offset => "offset",
            Attr::FirstAllowedIndex => "first_allowed_index",
            Attr::LastAllowedIndex => "last_allowed_index",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
