use rand::Rng;

use stencilgrid::{EngineConfig, GridBuilder, InnerOrder, OrExit, Tolerance};

/// ----------------------
/// Build a padded t/x/y/z grid, alias a second grid onto it,
/// and compare both against an independently filled copy.
/// ----------------------
fn main() {
    let config = EngineConfig::default()
        .with_inner_order(InnerOrder::FirstInner)
        .with_tolerance(Tolerance::Scaled);

    let build = |name: &str, halo: i64| {
        let mut g = GridBuilder::new(name)
            .config(config)
            .step_dim("t")
            .folded_domain_dim("x", 4)
            .domain_dim("y")
            .domain_dim("z")
            .build::<f32>()
            .or_exit();
        g.set_alloc_size("t", 2).or_exit();
        for (dim, size) in [("x", 16), ("y", 8), ("z", 8)] {
            g.set_domain_size(dim, size).or_exit();
            g.set_halo_size(dim, halo).or_exit();
        }
        g
    };

    let mut pressure = build("pressure", 2);
    let mut reference = build("reference", 2);
    let mut alias = build("alias", 1);
    pressure.alloc_storage().or_exit();
    reference.alloc_storage().or_exit();
    alias.share_storage(&pressure).or_exit();

    let mut rng = rand::rng();
    let (first, last) = ([0, 0, 0, 0], [1, 15, 7, 7]);
    let n = (2 * 16 * 8 * 8) as usize;
    let values: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
    pressure.set_elements_in_slice(&values, &first, &last).or_exit();
    reference.set_elements_in_slice(&values, &first, &last).or_exit();

    println!("{}", pressure.dims().info());
    println!("pressure vs reference: {} mismatches", pressure.compare(&reference, 1e-6, 5).mismatches);

    alias.set_element(42.0, &[1, 3, 3, 3], true).or_exit();
    let cmp = pressure.compare(&reference, 1e-6, 5);
    println!("after writing through alias: {} mismatches", cmp.mismatches);
    for m in &cmp.reported {
        println!("  at ({}): {} != {}", m.coord, m.value, m.reference);
    }
}
