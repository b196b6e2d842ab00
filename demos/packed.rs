use log::info;
use nalgebra::Vector2;
use snowfall::{
    shape::{Ball, Cuboid},
    Material, ParticleBatch, Result, Simulator, SimulatorConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut sim = Simulator::new(SimulatorConfig {
        resolution: [96, 96],
        seed: Some(1),
        ..Default::default()
    })?;

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
    levelset.add_polygon(
        &[
            Vector2::new(0.05, 0.05),
            Vector2::new(0.6, 0.05),
            Vector2::new(0.05, 0.35),
        ],
        false,
    )?;
    levelset.set_friction(0.4);
    sim.set_levelset(levelset)?;

    let block = Cuboid::new(Vector2::new(0.15, 0.55), Vector2::new(0.35, 0.75));
    let sand =
        sim.add_particles(ParticleBatch::new(block, Material::sand(), Vector2::zeros()).packed())?;
    let snow = sim.add_particles(ParticleBatch::new(
        Ball::new(Vector2::new(0.75, 0.3), 0.1),
        Material::snow(),
        Vector2::new(-0.5, 0.0),
    ))?;
    info!("{sand} packed sand particles, {snow} jittered snow particles");

    for frame in 0..60 {
        sim.advance_frame()?;
        if frame % 10 == 0 {
            info!(
                "frame {frame}: max speed {:.3}, active nodes {}",
                sim.particles().max_speed(),
                sim.grid().active_count()
            );
        }
    }
    Ok(())
}
