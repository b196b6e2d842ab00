use log::info;
use nalgebra::Vector2;
use snowfall::{Material, Result, Simulator, SimulatorConfig};

const FRAMES: u64 = 120;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // An optional JSON config path overrides the defaults.
    let config = match std::env::args().nth(1) {
        Some(path) => SimulatorConfig::from_file(path)?,
        None => SimulatorConfig {
            resolution: [128, 128],
            max_delta_t: 0.002,
            ..Default::default()
        },
    };
    let mut sim = Simulator::new(config)?;

    let mut levelset = sim.create_levelset();
    levelset.add_polygon(
        &[
            Vector2::new(0.05, 0.05),
            Vector2::new(0.95, 0.05),
            Vector2::new(0.95, 0.95),
            Vector2::new(0.05, 0.95),
        ],
        true,
    )?;
    sim.set_levelset(levelset)?;

    sim.add_event(-1, |s| {
        s.add_particles_sphere(
            Vector2::new(0.5, 0.35),
            0.2,
            Material::snow(),
            Vector2::new(0.0, -0.1),
        )?;
        Ok(())
    })?;
    sim.add_periodic_event(10, |s| {
        let com = s.particles().center_of_mass().unwrap_or_else(Vector2::zeros);
        info!(
            "frame {:4} t {:.3}s substeps {:6} dt {:.2e} KE {:.4e} center ({:.3}, {:.3})",
            s.frame(),
            s.time(),
            s.substeps(),
            s.dt(),
            s.kinetic_energy(),
            com.x,
            com.y
        );
        Ok(())
    })?;

    for _ in 0..FRAMES {
        sim.advance_frame()?;
    }
    info!("done: {:?}", sim);
    Ok(())
}
