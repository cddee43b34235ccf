//! Rising smoke plume with wavelet turbulence
//!
//! A hot, dense source near the floor of a vertically open box, a sphere in
//! the way, and a 2x turbulence grid on top. Prints per-step diagnostics.
//!
//! Optional first argument: a JSON `SimulationConfig` to run instead.
//!
//! Run with: RUST_LOG=info cargo run --example plume -p smoke3d --release

use std::path::Path;
use std::time::Instant;

use smoke3d::{
    BorderMode, Grid3D, ObstacleShape, SimulationConfig, SmokeSimulation3D, TurbulenceParams,
    Vec3,
};

const STEPS: u64 = 60;

fn default_config() -> SimulationConfig {
    let mut config = SimulationConfig {
        resolution: [32, 32, 48],
        ..SimulationConfig::default()
    };
    config.smoke.borders = BorderMode::VerticallyOpen;
    config.smoke.vorticity = 2.0;
    config.turbulence = Some(TurbulenceParams {
        amplify: 2,
        noise_cache: Some(std::env::temp_dir().join("smoke3d_noise.bin")),
        ..TurbulenceParams::default()
    });
    config
}

fn main() -> smoke3d::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load_json(Path::new(&path))?,
        None => default_config(),
    };

    println!("=== SMOKE PLUME ===");
    println!("Resolution: {:?}", config.resolution);
    println!("Borders: {:?}", config.smoke.borders);
    if let Some(t) = &config.turbulence {
        println!("Turbulence: x{} ({:?})", t.amplify, t.variant);
    }
    println!();

    let start = Instant::now();
    let mut sim = SmokeSimulation3D::new(&config)?;
    println!("Setup: {:.2?}", start.elapsed());

    // Domain is one unit along its longest axis
    let extent = sim.grid.res_vec() * sim.grid.dx;
    let sphere = ObstacleShape::Sphere {
        center: Vec3::new(extent.x * 0.5, extent.y * 0.5, extent.z * 0.55),
        radius: extent.x * 0.12,
    };
    let solid = sim.add_obstacle(&sphere);
    println!("Obstacle cells: {}", solid);

    let source = ObstacleShape::Aabb {
        min: Vec3::new(extent.x * 0.4, extent.y * 0.4, extent.z * 0.05),
        max: Vec3::new(extent.x * 0.6, extent.y * 0.6, extent.z * 0.1),
    };

    println!();
    println!(
        "{:>5} {:>8} {:>10} {:>10} {:>8} {:>8} {:>9} {:>8}",
        "step", "time", "density", "centroid", "max|v|", "p iters", "fine |v|", "substeps"
    );

    // The fine grid gets its own copy of the source at the matching location
    let fine_source = sim.turbulence().map(|engine| fine_source_cells(engine.fine_grid()));

    let run_start = Instant::now();
    for _ in 0..STEPS {
        sim.inflow(&source, 1.0, 1.0);
        if let (Some(engine), Some(cells)) = (sim.turbulence_mut(), &fine_source) {
            let density = engine.density_mut();
            for &idx in cells {
                density[idx] = 1.0;
            }
        }

        let report = sim.step();

        if report.step % 5 == 0 {
            let centroid = sim.density_centroid().map(|c| c.z).unwrap_or(0.0);
            let (fine_v, substeps) = report
                .turbulence
                .map(|t| (t.max_velocity, t.substeps))
                .unwrap_or((0.0, 0));
            println!(
                "{:>5} {:>8.3} {:>10.2} {:>10.2} {:>8.4} {:>8} {:>9.4} {:>8}",
                report.step,
                report.time,
                sim.total_density(),
                centroid,
                sim.max_velocity(),
                report.pressure.iterations,
                fine_v,
                substeps
            );
        }
    }

    let elapsed = run_start.elapsed();
    println!();
    println!(
        "{} steps in {:.2?} ({:.1} ms/step)",
        STEPS,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / STEPS as f64
    );
    Ok(())
}

/// Fine cells under the coarse inflow box.
fn fine_source_cells(fine: &Grid3D) -> Vec<usize> {
    let res = fine.res();
    let lo = |axis: usize, frac: f32| (res[axis] as f32 * frac) as usize;
    let mut cells = Vec::new();
    for z in lo(2, 0.05).max(1)..lo(2, 0.1) {
        for y in lo(1, 0.4)..lo(1, 0.6) {
            for x in lo(0, 0.4)..lo(0, 0.6) {
                cells.push(fine.index(x, y, z));
            }
        }
    }
    cells
}
