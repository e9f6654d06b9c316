use std::sync::Arc;

use crate::dim::DimKind;
use crate::element::Element;
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::tuple::Tuple;

/// One element that differs beyond tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Logical (offset-relative) coordinate.
    pub coord: Tuple,
    pub value: f64,
    pub reference: f64,
}

/// Outcome of [`Grid::compare`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comparison {
    /// Number of differing elements, counted over the whole allocation.
    pub mismatches: i64,
    /// The first `max_print` mismatches found.
    pub reported: Vec<Mismatch>,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.mismatches == 0
    }
}

impl<T: Element> Grid<T> {
    /// True when both grids would lay out elements at identical addresses.
    pub fn is_storage_layout_identical(&self, other: &Grid<T>) -> bool {
        if self.num_storage_bytes() != other.num_storage_bytes() {
            return false;
        }
        if !self.dims.same_names(&other.dims) {
            return false;
        }
        if self.dims.inner_order() != other.dims.inner_order() {
            return false;
        }
        self.dims
            .dims()
            .iter()
            .zip(other.dims.dims())
            .all(|(a, b)| a.alloc == b.alloc && a.domain == b.domain && a.pad == b.pad)
    }

    /// Alias this grid's storage to `source`'s buffer.
    ///
    /// Dims must match by name and position, and both grids must use the
    /// same inner order; non-domain allocations and domain
    /// sizes must be equal, and this grid's halos must fit in the source's
    /// pads. On success any previously held buffer is released and the
    /// source's pads are adopted.
    pub fn share_storage(&mut self, source: &Grid<T>) -> Result<()> {
        const OP: &str = "share_storage";
        let src_buf = Arc::clone(source.require_storage(OP)?);

        let incompatible = |reason: String| GridError::Incompatible {
            op: OP,
            grid: self.name().to_string(),
            other: source.name().to_string(),
            reason,
        };

        if !self.dims.same_names(&source.dims) {
            return Err(incompatible(format!(
                "{} vs {}",
                self.dims.info(),
                source.dims.info()
            )));
        }
        if self.dims.inner_order() != source.dims.inner_order() {
            return Err(incompatible(format!(
                "inner order {:?} vs {:?}",
                self.dims.inner_order(),
                source.dims.inner_order()
            )));
        }
        for (t, s) in self.dims.dims().iter().zip(source.dims.dims()) {
            if t.kind != s.kind {
                return Err(incompatible(format!(
                    "'{}' is {} here but {} in the source",
                    t.name, t.kind, s.kind
                )));
            }
            if t.kind != DimKind::Domain {
                if t.alloc != s.alloc {
                    return Err(incompatible(format!(
                        "alloc-size {} vs {} in '{}' dim",
                        t.alloc, s.alloc, t.name
                    )));
                }
                continue;
            }
            if t.domain != s.domain {
                return Err(incompatible(format!(
                    "domain-size {} vs {} in '{}' dim",
                    t.domain, s.domain, t.name
                )));
            }
            if t.halo > s.pad {
                return Err(GridError::HaloExceedsPad {
                    grid: self.name().to_string(),
                    source_grid: source.name().to_string(),
                    dim: t.name.clone(),
                    halo: t.halo,
                    pad: s.pad,
                });
            }
        }

        // Adopt the source pads on a detached copy, then verify the result.
        let mut dims = self.dims.clone();
        dims.set_storage_attached(false);
        for s in source.dims.dims() {
            dims.set_pad_size(&s.name, s.pad)?;
        }
        if dims.alloc_vals() != source.dims.alloc_vals() {
            return Err(incompatible(format!(
                "allocation ({}) vs ({})",
                dims.allocs(),
                source.allocs()
            )));
        }

        self.release_storage();
        self.dims = dims;
        self.attach(src_buf);
        tracing::debug!(grid = %self.name(), source = %source.name(), "sharing grid storage");
        Ok(())
    }

    /// Count elements differing from `reference` by more than `epsilon`
    /// under the configured tolerance.
    ///
    /// Grids with different layouts (or no storage) count every element as
    /// a mismatch without reading data. Up to `max_print` mismatches are
    /// logged and returned; counting continues past that.
    pub fn compare(&self, reference: &Grid<T>, epsilon: f64, max_print: usize) -> Comparison {
        let total = self.num_storage_elements();
        let (Some(ours), Some(theirs)) = (&self.storage, &reference.storage) else {
            tracing::warn!(grid = %self.name(), reference = %reference.name(), "mismatch: storage not allocated");
            return Comparison {
                mismatches: total,
                reported: Vec::new(),
            };
        };
        if !self.is_storage_layout_identical(reference) {
            tracing::warn!(
                "mismatch due to incompatible grids: {}; and {}",
                self.dims.info(),
                reference.dims.info()
            );
            return Comparison {
                mismatches: total,
                reported: Vec::new(),
            };
        }

        let tolerance = self.config.tolerance;
        let within = |a: T, b: T| tolerance.within(a.to_f64(), b.to_f64(), epsilon);

        // Aliased grids hold the same lock twice.
        let ours = ours.read_recursive();
        let theirs = theirs.read_recursive();

        let quick = ours.iter().zip(theirs.iter()).filter(|(a, b)| !within(**a, **b)).count();
        tracing::trace!(grid = %self.name(), diffs = quick, "bulk compare");
        if quick == 0 {
            return Comparison::default();
        }

        let mut result = Comparison::default();
        // Allocation-relative points shifted to logical coordinates.
        let firsts = self.dims.tuple_of(|d| d.first_allowed());
        self.allocs().visit_all_points(|pt, _| {
            let Ok(opt) = pt.add(&firsts) else {
                return false;
            };
            let idxs = opt.vals();
            let te = ours[self.storage_index(&idxs)];
            let re = theirs[reference.storage_index(&idxs)];
            if within(te, re) {
                return true;
            }
            result.mismatches += 1;
            if result.reported.len() < max_print {
                tracing::warn!(
                    "mismatch at {}({}): {} != {}",
                    self.name(),
                    opt,
                    te,
                    re
                );
                result.reported.push(Mismatch {
                    coord: opt,
                    value: te.to_f64(),
                    reference: re.to_f64(),
                });
            } else if result.mismatches == max_print as i64 + 1 {
                tracing::warn!("additional mismatches in {} not printed", self.name());
            }
            true
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Tolerance};
    use crate::grid::{GridBuilder, StorageState};
    use crate::layout::InnerOrder;
    use rand::Rng;

    fn grid(name: &str, x: i64, y: i64, halo: i64) -> Grid<f64> {
        let mut g = GridBuilder::new(name)
            .step_dim("t")
            .domain_dim("x")
            .domain_dim("y")
            .build::<f64>()
            .unwrap();
        g.set_alloc_size("t", 2).unwrap();
        g.set_domain_size("x", x).unwrap();
        g.set_domain_size("y", y).unwrap();
        g.set_halo_size("x", halo).unwrap();
        g.set_halo_size("y", halo).unwrap();
        g
    }

    #[test]
    fn identical_fresh_grids_match() {
        let mut a = grid("a", 4, 3, 1);
        let mut b = grid("b", 4, 3, 1);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        assert!(a.is_storage_layout_identical(&b));
        let c = a.compare(&b, 0.0, 10);
        assert!(c.is_match());
        assert!(c.reported.is_empty());
    }

    #[test]
    fn single_mismatch_reported() {
        let eps = 0.001;
        let mut a = grid("a", 4, 3, 1);
        let mut b = grid("b", 4, 3, 1);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        b.set_element(2.0 * eps, &[1, -1, 2], true).unwrap();

        let c = a.compare(&b, eps, 10);
        assert_eq!(c.mismatches, 1);
        assert_eq!(c.reported.len(), 1);
        assert_eq!(c.reported[0].coord.vals(), vec![1, -1, 2]);
        assert_eq!(c.reported[0].coord.to_string(), "t=1, x=-1, y=2");
        assert_eq!(c.reported[0].reference, 2.0 * eps);

        // Within tolerance.
        b.set_element(0.5 * eps, &[1, -1, 2], true).unwrap();
        assert!(a.compare(&b, eps, 10).is_match());
    }

    #[test]
    fn counting_continues_past_max_print() {
        let mut a = grid("a", 4, 3, 0);
        let mut b = grid("b", 4, 3, 0);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        let mut rng = rand::rng();
        b.set_elements_in_slice_same(1.0, &[0, 0, 0], &[1, 3, 2], true).unwrap();
        let x = rng.random_range(0..4);
        a.set_element(1.0, &[0, x, 0], true).unwrap();

        let c = a.compare(&b, 0.0, 3);
        assert_eq!(c.mismatches, 23);
        assert_eq!(c.reported.len(), 3);
    }

    #[test]
    fn incompatible_grids_count_everything() {
        let mut a = grid("a", 4, 3, 0);
        let mut b = grid("b", 5, 3, 0);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        assert!(!a.is_storage_layout_identical(&b));
        let c = a.compare(&b, 0.0, 10);
        assert_eq!(c.mismatches, a.num_storage_elements());
        assert!(c.reported.is_empty());

        let unallocated = grid("u", 4, 3, 0);
        assert_eq!(a.compare(&unallocated, 0.0, 10).mismatches, 24);
    }

    #[test]
    fn scaled_tolerance_from_config() {
        let cfg = EngineConfig::default().with_tolerance(Tolerance::Scaled);
        let build = |name: &str| {
            let mut g = GridBuilder::new(name)
                .config(cfg)
                .domain_dim("x")
                .build::<f32>()
                .unwrap();
            g.set_domain_size("x", 2).unwrap();
            g.alloc_storage().unwrap();
            g
        };
        let mut a = build("a");
        let mut b = build("b");
        a.set_element(1000.0, &[0], true).unwrap();
        b.set_element(1000.5, &[0], true).unwrap();
        assert!(a.compare(&b, 0.001, 0).is_match());
    }

    #[test]
    fn share_storage_round_trip() {
        let mut a = grid("a", 4, 3, 2);
        let mut b = grid("b", 4, 3, 1);
        a.alloc_storage().unwrap();
        b.share_storage(&a).unwrap();

        assert_eq!(b.pad_size("x").unwrap(), 2);
        assert_eq!(b.halo_size("x").unwrap(), 1);
        assert_eq!(a.storage_state(), StorageState::Shared);
        assert_eq!(b.storage_state(), StorageState::Shared);

        a.set_element(3.25, &[0, -2, 4], true).unwrap();
        assert_eq!(b.get_element(&[0, -2, 4]).unwrap(), 3.25);
        b.set_element(-1.0, &[1, 3, 0], true).unwrap();
        assert_eq!(a.get_element(&[1, 3, 0]).unwrap(), -1.0);
        assert!(a.compare(&b, 0.0, 5).is_match());

        // Source release leaves the buffer alive for the sharer.
        a.release_storage();
        assert_eq!(b.storage_state(), StorageState::Owned);
        assert_eq!(b.get_element(&[0, -2, 4]).unwrap(), 3.25);
    }

    #[test]
    fn share_replaces_own_buffer() {
        let mut a = grid("a", 4, 3, 1);
        let mut b = grid("b", 4, 3, 1);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        b.set_element(9.0, &[0, 0, 0], true).unwrap();
        b.share_storage(&a).unwrap();
        assert_eq!(b.get_element(&[0, 0, 0]).unwrap(), 0.0);
    }

    #[test]
    fn share_preconditions() {
        let a = grid("a", 4, 3, 1);
        let mut b = grid("b", 4, 3, 1);
        assert!(matches!(
            b.share_storage(&a),
            Err(GridError::NotAllocated { .. })
        ));

        let mut a = grid("a", 4, 3, 1);
        a.alloc_storage().unwrap();
        let mut wide_halo = grid("b", 4, 3, 2);
        assert!(matches!(
            wide_halo.share_storage(&a),
            Err(GridError::HaloExceedsPad { halo: 2, pad: 1, .. })
        ));
        assert_eq!(wide_halo.storage_state(), StorageState::Unallocated);

        let mut other_domain = grid("c", 5, 3, 1);
        assert!(matches!(
            other_domain.share_storage(&a),
            Err(GridError::Incompatible { .. })
        ));

        let mut other_steps = grid("d", 4, 3, 1);
        other_steps.set_alloc_size("t", 3).unwrap();
        assert!(matches!(
            other_steps.share_storage(&a),
            Err(GridError::Incompatible { .. })
        ));

        let mut renamed = GridBuilder::new("e")
            .config(EngineConfig::default().with_inner_order(InnerOrder::FirstInner))
            .step_dim("t")
            .domain_dim("y")
            .domain_dim("x")
            .build::<f64>()
            .unwrap();
        assert!(matches!(
            renamed.share_storage(&a),
            Err(GridError::Incompatible { .. })
        ));
    }

    #[test]
    fn share_rejects_fold_mismatch() {
        let mut a = grid("a", 8, 3, 1);
        a.alloc_storage().unwrap();
        let mut b = GridBuilder::new("b")
            .step_dim("t")
            .folded_domain_dim("x", 4)
            .domain_dim("y")
            .build::<f64>()
            .unwrap();
        b.set_alloc_size("t", 2).unwrap();
        b.set_domain_size("x", 8).unwrap();
        b.set_domain_size("y", 3).unwrap();
        assert!(matches!(
            b.share_storage(&a),
            Err(GridError::Incompatible { .. })
        ));
    }

    fn grid_ordered(name: &str, order: InnerOrder) -> Grid<f64> {
        let mut g = GridBuilder::new(name)
            .config(EngineConfig::default().with_inner_order(order))
            .domain_dim("x")
            .domain_dim("y")
            .build::<f64>()
            .unwrap();
        g.set_domain_size("x", 3).unwrap();
        g.set_domain_size("y", 2).unwrap();
        g
    }

    #[test]
    fn share_rejects_other_inner_order() {
        let mut a = grid_ordered("a", InnerOrder::FirstInner);
        a.alloc_storage().unwrap();
        let mut b = grid_ordered("b", InnerOrder::LastInner);
        assert!(matches!(
            b.share_storage(&a),
            Err(GridError::Incompatible { .. })
        ));
        assert_eq!(b.storage_state(), StorageState::Unallocated);
        assert_eq!(a.storage_state(), StorageState::Owned);

        let mut c = grid_ordered("c", InnerOrder::FirstInner);
        c.share_storage(&a).unwrap();
        a.set_element(7.0, &[1, 0], true).unwrap();
        assert_eq!(c.get_element(&[1, 0]).unwrap(), 7.0);
    }

    #[test]
    fn other_inner_order_is_not_layout_identical() {
        let mut a = grid_ordered("a", InnerOrder::FirstInner);
        let mut b = grid_ordered("b", InnerOrder::LastInner);
        a.alloc_storage().unwrap();
        b.alloc_storage().unwrap();
        let mut v = 0.0;
        for x in 0..3 {
            for y in 0..2 {
                a.set_element(v, &[x, y], true).unwrap();
                v += 1.0;
            }
        }
        // Same raw bytes, different logical contents.
        let raw = a.storage.as_ref().unwrap().read().clone();
        *b.storage.as_ref().unwrap().write() = raw;
        assert_ne!(a.get_element(&[1, 0]).unwrap(), b.get_element(&[1, 0]).unwrap());

        assert!(!a.is_storage_layout_identical(&b));
        let c = a.compare(&b, 0.0, 10);
        assert_eq!(c.mismatches, 6);
        assert!(c.reported.is_empty());
    }

    #[test]
    fn mismatches_report_offset_coordinates() {
        let mut a = grid("a", 4, 3, 1);
        let mut b = grid("b", 4, 3, 1);
        for g in [&mut a, &mut b] {
            g.set_first_domain_index("x", 10).unwrap();
            g.alloc_storage().unwrap();
        }
        assert_eq!(a.first_allowed_index("x").unwrap(), 9);
        assert_eq!(a.last_allowed_index("x").unwrap(), 14);

        b.set_element(1.0, &[1, 12, 1], true).unwrap();
        b.set_element(2.0, &[0, 9, -1], true).unwrap();
        assert!(a.get_element(&[0, 8, 0]).is_err());

        let c = a.compare(&b, 0.0, 10);
        assert_eq!(c.mismatches, 2);
        let mut found: Vec<(Vec<i64>, f64)> =
            c.reported.iter().map(|m| (m.coord.vals(), m.reference)).collect();
        found.sort_by(|p, q| p.0.cmp(&q.0));
        assert_eq!(found, vec![(vec![0, 9, -1], 2.0), (vec![1, 12, 1], 1.0)]);
    }
}
