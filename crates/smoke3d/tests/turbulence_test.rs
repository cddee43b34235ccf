//! Wavelet turbulence tests
//!
//! Runs the fine grid on top of a live coarse simulation with a real noise
//! tile, shared across the tests in this file.

use std::sync::{Arc, OnceLock};

use smoke3d::{
    BorderMode, CoarseFlow, Grid3D, NoiseKind, SimulationConfig, SmokeSimulation3D,
    SynthesisVariant, TurbulenceParams, VectorField, WaveletNoiseTile, WaveletTurbulence,
};

fn noise() -> Arc<WaveletNoiseTile> {
    static TILE: OnceLock<Arc<WaveletNoiseTile>> = OnceLock::new();
    TILE.get_or_init(|| Arc::new(WaveletNoiseTile::generate(NoiseKind::Wavelet, 7).unwrap()))
        .clone()
}

fn config(variant: SynthesisVariant) -> SimulationConfig {
    let mut config = SimulationConfig {
        resolution: [10, 10, 12],
        ..SimulationConfig::default()
    };
    config.smoke.alpha = 1.0;
    config.smoke.beta = 0.0;
    config.smoke.borders = BorderMode::Closed;
    config.turbulence = Some(TurbulenceParams {
        amplify: 2,
        variant,
        ..TurbulenceParams::default()
    });
    config
}

fn seeded(variant: SynthesisVariant) -> SmokeSimulation3D {
    let mut sim = SmokeSimulation3D::with_noise_tile(&config(variant), noise()).unwrap();
    for z in 2..5 {
        for y in 4..7 {
            for x in 4..7 {
                sim.add_density(x, y, z, 1.0).unwrap();
            }
        }
    }
    let engine = sim.turbulence_mut().unwrap();
    let fine = *engine.fine_grid();
    let density = engine.density_mut();
    for z in 4..10 {
        for y in 8..14 {
            for x in 8..14 {
                density[fine.index(x, y, z)] = 1.0;
            }
        }
    }
    sim
}

fn assert_fine_state_sane(engine: &WaveletTurbulence) {
    let fine = engine.fine_grid();
    for (idx, &d) in engine.density().iter().enumerate() {
        assert!(d.is_finite());
        assert!((-0.5..=1.5).contains(&d), "fine density {}", d);
        let (x, y, z) = fine.coords(idx);
        if !fine.is_interior(x, y, z) {
            assert_eq!(d, 0.0);
        }
    }
    let vel = engine.velocity();
    assert!(vel.x.iter().chain(&vel.y).chain(&vel.z).all(|v| v.is_finite()));
}

fn run(variant: SynthesisVariant) {
    let mut sim = seeded(variant);
    for i in 0..4u64 {
        let report = sim.step();
        let turbulence = report.turbulence.unwrap();
        assert_eq!(turbulence.step, i + 1);
        assert!(turbulence.substeps >= 1);
        assert!(turbulence.max_velocity.is_finite());
        assert_fine_state_sane(sim.turbulence().unwrap());
    }
    let engine = sim.turbulence().unwrap();
    assert_eq!(engine.steps(), 4);
    assert!(engine.high_freq_energy().iter().all(|e| e.is_finite()));
}

#[test]
fn test_full_variant_on_live_flow() {
    run(SynthesisVariant::Full);
}

#[test]
fn test_readable_variant_on_live_flow() {
    run(SynthesisVariant::Readable);
}

/// Noise adds sub-grid motion the coarse flow does not have
#[test]
fn test_noise_adds_fine_detail() {
    let coarse = Grid3D::new(10, 10, 10).unwrap();
    let mut velocity = VectorField::zeros(coarse.total_cells);
    // a rough shear gives non-zero high band energy
    for idx in 0..coarse.total_cells {
        let (x, _, z) = coarse.coords(idx);
        velocity.x[idx] = 0.1 * z as f32;
        velocity.y[idx] = 0.05 * ((x * 7 + z * 3) % 5) as f32;
    }
    let obstacles = vec![0u8; coarse.total_cells];
    let flow = CoarseFlow {
        velocity: velocity.view(),
        obstacles: &obstacles,
        dt: 0.1,
    };

    let params = TurbulenceParams {
        amplify: 2,
        ..TurbulenceParams::default()
    };
    let mut noisy = WaveletTurbulence::with_noise_tile(&coarse, &params, noise()).unwrap();
    let mut plain = WaveletTurbulence::with_noise_tile(&coarse, &params, noise()).unwrap();
    plain.strength = 0.0;

    let report = noisy.step(&flow);
    plain.step(&flow);

    assert_eq!(report.step, 1);
    assert!(noisy.high_freq_energy().iter().any(|&e| e != 0.0));

    let (a, b) = (noisy.velocity(), plain.velocity());
    let differs = (0..a.len()).any(|idx| (a.get(idx) - b.get(idx)).length() > 1e-6);
    assert!(differs, "fine velocity has no noise component");
}

/// Without coarse motion there is nothing to amplify
#[test]
fn test_still_flow_adds_no_noise() {
    let coarse = Grid3D::new(8, 8, 8).unwrap();
    let velocity = VectorField::zeros(coarse.total_cells);
    let obstacles = vec![0u8; coarse.total_cells];
    let mut engine =
        WaveletTurbulence::with_noise_tile(&coarse, &TurbulenceParams::default(), noise()).unwrap();
    let flow = CoarseFlow {
        velocity: velocity.view(),
        obstacles: &obstacles,
        dt: 0.1,
    };
    let report = engine.step(&flow);
    assert_eq!(report.max_velocity, 0.0);
    assert_eq!(report.substeps, 1);
    let vel = engine.velocity();
    assert!(vel.x.iter().chain(&vel.y).chain(&vel.z).all(|&v| v == 0.0));
}
