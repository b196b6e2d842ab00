use super::*;

type Callback = Box<dyn FnMut(&mut Simulator) -> Result<()> + Send>;

/// When a scheduled event runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Once, before the first sub-step.
    Start,
    /// Once, when the frame begins.
    Frame(u64),
    /// Every `period` frames, starting at frame 0.
    Every(u64),
}

impl Trigger {
    /// Maps the frame convention of scene scripts: `-1` means at start.
    pub fn from_frame(frame: i64) -> Result<Self> {
        match frame {
            -1 => Ok(Trigger::Start),
            f if f >= 0 => Ok(Trigger::Frame(f as u64)),
            f => Err(Error::InvalidParam(format!(
                "event frame must be -1 or non-negative, got {f}"
            ))),
        }
    }
}

struct Event {
    trigger: Trigger,
    callback: Callback,
    // Frame this event last ran in; keeps periodic events from repeating
    // when a frame is dispatched again after a failure.
    ran_at: Option<u64>,
}

pub struct Simulator {
    config: SimulatorConfig,
    particles: Particles,
    grid: Grid,
    levelset: LevelSet,
    events: Vec<Event>,
    rng: Pcg64Mcg,
    time: f64,
    frame: u64,
    dt: f32,
    substeps: u64,
    started: bool,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("resolution", &self.config.resolution)
            .field("particles", &self.particles.len())
            .field("events", &self.events.len())
            .field("time", &self.time)
            .field("frame", &self.frame)
            .field("dt", &self.dt)
            .finish()
    }
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let [width, height] = config.resolution;
        let dx = config.dx();
        let rng = match config.seed {
            Some(seed) => Pcg64Mcg::seed_from_u64(seed),
            None => Pcg64Mcg::from_entropy(),
        };
        info!(
            "simulator {width}x{height}, dx {dx}, dt in [{}, {}]",
            config.min_delta_t, config.max_delta_t
        );
        Ok(Self {
            dt: config.initial_dt.min(config.max_delta_t),
            grid: Grid::new(width, height, dx),
            levelset: LevelSet::new(width, height, dx),
            particles: Particles::new(),
            events: Vec::new(),
            rng,
            time: 0.0,
            frame: 0,
            substeps: 0,
            started: false,
            config,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
    pub fn particles(&self) -> &Particles {
        &self.particles
    }
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
    pub fn levelset(&self) -> &LevelSet {
        &self.levelset
    }
    pub fn time(&self) -> f64 {
        self.time
    }
    pub fn frame(&self) -> u64 {
        self.frame
    }
    /// The most recent sub-step length.
    pub fn dt(&self) -> f32 {
        self.dt
    }
    pub fn substeps(&self) -> u64 {
        self.substeps
    }
    pub fn total_mass(&self) -> f32 {
        self.particles.total_mass()
    }
    pub fn kinetic_energy(&self) -> f32 {
        self.particles.kinetic_energy()
    }
    /// Extent of the simulated domain; x spans `[0, 1]`.
    pub fn domain(&self) -> Vector2<f32> {
        Vector2::new(self.grid.width() as f32, self.grid.height() as f32) * self.grid.dx()
    }

    /// Schedules `callback` for `trigger_frame`, where `-1` runs it once
    /// before the first sub-step.
    pub fn add_event(
        &mut self,
        trigger_frame: i64,
        callback: impl FnMut(&mut Simulator) -> Result<()> + Send + 'static,
    ) -> Result<()> {
        let trigger = Trigger::from_frame(trigger_frame)?;
        self.schedule(trigger, callback)
    }

    pub fn add_periodic_event(
        &mut self,
        period: u64,
        callback: impl FnMut(&mut Simulator) -> Result<()> + Send + 'static,
    ) -> Result<()> {
        self.schedule(Trigger::Every(period), callback)
    }

    pub fn schedule(
        &mut self,
        trigger: Trigger,
        callback: impl FnMut(&mut Simulator) -> Result<()> + Send + 'static,
    ) -> Result<()> {
        if trigger == Trigger::Every(0) {
            return Err(Error::InvalidParam("event period must be > 0".into()));
        }
        trace!("scheduled event {trigger:?}");
        self.events.push(Event {
            trigger,
            callback: Box::new(callback),
            ran_at: None,
        });
        Ok(())
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Runs the due events in insertion order. After a failure the rest
    /// stay scheduled and run on the next dispatch.
    fn run_events(&mut self, due: impl Fn(&Event) -> bool) -> Result<()> {
        let mut events = std::mem::take(&mut self.events);
        let mut kept = Vec::with_capacity(events.len());
        let mut result = Ok(());
        for mut event in events.drain(..) {
            if result.is_err() || !due(&event) {
                kept.push(event);
                continue;
            }
            trace!("running event {:?} at frame {}", event.trigger, self.frame);
            event.ran_at = Some(self.frame);
            result = (event.callback)(self);
            if matches!(event.trigger, Trigger::Every(_)) {
                kept.push(event);
            }
        }
        // Events scheduled by callbacks land after the survivors.
        kept.append(&mut self.events);
        self.events = kept;
        result
    }

    fn run_start_events(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.run_events(|e| e.trigger == Trigger::Start)?;
        self.started = true;
        Ok(())
    }

    fn run_frame_events(&mut self) -> Result<()> {
        let frame = self.frame;
        self.run_events(|e| match e.trigger {
            Trigger::Start => false,
            Trigger::Frame(f) => f == frame,
            Trigger::Every(period) => frame % period == 0 && e.ran_at != Some(frame),
        })
    }

    /// An empty level set matching this simulator's grid.
    pub fn create_levelset(&self) -> LevelSet {
        LevelSet::new(self.grid.width(), self.grid.height(), self.grid.dx())
    }

    pub fn set_levelset(&mut self, levelset: LevelSet) -> Result<()> {
        let expected = self.grid.node_shape();
        let found = levelset.node_shape();
        if expected != found || levelset.dx() != self.grid.dx() {
            return Err(Error::LevelSetMismatch {
                expected: expected.into(),
                found: found.into(),
            });
        }
        info!(
            "bound level set with friction {}{}",
            levelset.friction(),
            if levelset.is_empty() { " (empty)" } else { "" }
        );
        self.levelset = levelset;
        Ok(())
    }

    fn clamp_to_domain(&self, position: Vector2<f32>) -> Vector2<f32> {
        let margin = self.grid.dx();
        let max = self.domain() - Vector2::repeat(margin);
        position.zip_map(&max, |x, hi| x.clamp(margin, hi))
    }

    /// Seeds a batch of particles and returns how many were added.
    pub fn add_particles<V: VolumeCore<2>>(&mut self, batch: ParticleBatch<V>) -> Result<usize> {
        if !batch.velocity.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("batch velocity must be finite".into()));
        }
        let dx = self.grid.dx();
        let per_cell = self.config.particles_per_cell;
        let rng = Pcg64Mcg::seed_from_u64(self.rng.gen());
        let points = match batch.seeding {
            Seeding::Jittered => batch.shape.seed_points(
                SeedSettings {
                    cell_size: dx,
                    per_cell,
                },
                rng,
            ),
            Seeding::Lattice => {
                let spacing = dx / per_cell.sqrt();
                batch.shape.grid_points(GridSettings {
                    spacing: Vector2::repeat(spacing),
                    offset: Some(Vector2::repeat(spacing * 0.5)),
                })
            }
            Seeding::Packed => {
                // One point per packing cell of size 2r gives `per_cell` per grid cell.
                let radius = dx / (2.0 * per_cell.sqrt());
                let settings = PackedSettings {
                    radius,
                    density: 1.0,
                    ..radius.into()
                };
                batch.shape.packed_points(settings, rng).points
            }
        };
        let volume = dx * dx / per_cell;
        let mass = volume * batch.material.density();
        let before = self.particles.len();
        for point in points {
            let position = self.clamp_to_domain(point);
            self.particles.push(Particle::new(
                position,
                batch.velocity,
                mass,
                volume,
                batch.material,
            )?);
        }
        let added = self.particles.len() - before;
        info!(
            "seeded {added} {} particles ({} total)",
            batch.material.tag(),
            self.particles.len()
        );
        Ok(added)
    }

    pub fn add_particles_sphere(
        &mut self,
        center: Vector2<f32>,
        radius: f32,
        material: Material,
        velocity: Vector2<f32>,
    ) -> Result<usize> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam(format!(
                "sphere radius must be finite and > 0, got {radius}"
            )));
        }
        self.add_particles(ParticleBatch::new(
            shape::Ball::new(center, radius),
            material,
            velocity,
        ))
    }

    /// The longest sub-step the CFL condition allows right now.
    pub fn stable_dt(&self) -> f32 {
        let speed = self
            .particles
            .iter()
            .map(|p| p.velocity.norm() + p.material.wave_speed(p.jp))
            .fold(0.0, f32::max);
        if speed > 0.0 {
            self.config.cfl * self.grid.dx() / speed
        } else {
            f32::INFINITY
        }
    }

    fn next_dt(&self) -> f32 {
        let grown = if self.substeps == 0 {
            self.config.initial_dt
        } else {
            self.dt * 2.0
        };
        let dt = grown.min(self.config.max_delta_t).min(self.stable_dt());
        if dt < self.config.min_delta_t {
            warn!(
                "sub-step {dt:e} below the floor, using {:e}",
                self.config.min_delta_t
            );
            return self.config.min_delta_t;
        }
        dt
    }

    /// Runs one adaptive sub-step and returns its length.
    pub fn step(&mut self) -> Result<f32> {
        self.run_start_events()?;
        let dt = self.next_dt();
        self.substep(dt)?;
        Ok(dt)
    }

    fn substep(&mut self, dt: f32) -> Result<()> {
        self.grid.reset();
        transfer::particles_to_grid(&mut self.grid, &self.particles, dt);
        self.grid.reorder();
        self.grid.normalize_velocity();
        self.grid.backup_velocity();
        self.grid.apply_external_force(self.config.gravity(), dt);
        self.grid.apply_boundary_conditions(&self.levelset);
        if self.config.check_velocities {
            self.grid.check_velocity()?;
        }
        transfer::grid_to_particles(
            &self.grid,
            &mut self.particles,
            dt,
            self.config.flip_alpha,
        );

        let margin = self.grid.dx();
        let max = self.domain() - Vector2::repeat(margin);
        let mut projected = 0;
        for (i, p) in self.particles.as_mut_slice().iter_mut().enumerate() {
            if !p.is_finite() {
                return Err(Error::NonFiniteParticle(i));
            }
            if self.levelset.project(&mut p.position, &mut p.velocity) {
                projected += 1;
            }
            p.position = p.position.zip_map(&max, |x, hi| x.clamp(margin, hi));
        }

        self.dt = dt;
        self.time += dt as f64;
        self.substeps += 1;
        debug!(
            "sub-step {} dt {dt:e} t {:.5} active nodes {} projected {projected}",
            self.substeps,
            self.time,
            self.grid.active_count()
        );
        Ok(())
    }

    /// Sub-steps until `duration` has passed; the last one is shortened to
    /// land exactly.
    pub fn advance(&mut self, duration: f32) -> Result<()> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidParam(format!(
                "duration must be finite and >= 0, got {duration}"
            )));
        }
        self.run_start_events()?;
        let target = self.time + duration as f64;
        while self.time < target {
            let remaining = (target - self.time) as f32;
            let dt = self.next_dt();
            if remaining <= dt || remaining < self.config.min_delta_t {
                self.substep(remaining.max(f32::MIN_POSITIVE))?;
                self.time = target;
                break;
            }
            self.substep(dt)?;
        }
        Ok(())
    }

    /// Runs the events due this frame, then simulates one frame.
    pub fn advance_frame(&mut self) -> Result<()> {
        self.run_start_events()?;
        self.run_frame_events()?;
        self.advance(self.config.frame_dt)?;
        self.frame += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn small() -> Result<Simulator> {
        Simulator::new(SimulatorConfig {
            resolution: [32, 32],
            particles_per_cell: 4.0,
            seed: Some(3),
            check_velocities: true,
            ..Default::default()
        })
    }

    #[test]
    fn event_frames_are_validated() {
        assert_eq!(Trigger::from_frame(-1).ok(), Some(Trigger::Start));
        assert_eq!(Trigger::from_frame(4).ok(), Some(Trigger::Frame(4)));
        assert!(Trigger::from_frame(-2).is_err());
    }

    #[test]
    fn start_event_runs_once() -> Result<()> {
        let mut sim = small()?;
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        sim.add_event(-1, move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.add_particles_sphere(
                Vector2::new(0.5, 0.5),
                0.1,
                Material::snow(),
                Vector2::zeros(),
            )?;
            Ok(())
        })?;
        assert_eq!(sim.particles().len(), 0);
        sim.step()?;
        assert!(sim.particles().len() > 0);
        sim.step()?;
        sim.advance_frame()?;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(sim.pending_events(), 0);
        Ok(())
    }

    #[test]
    fn frame_and_periodic_events() -> Result<()> {
        let mut sim = small()?;
        let once = Arc::new(AtomicUsize::new(0));
        let every = Arc::new(AtomicUsize::new(0));
        let (o, e) = (once.clone(), every.clone());
        sim.add_event(2, move |_| {
            o.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
        sim.add_periodic_event(2, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
        for _ in 0..5 {
            sim.advance_frame()?;
        }
        assert_eq!(sim.frame(), 5);
        assert_eq!(once.load(Ordering::SeqCst), 1);
        // Frames 0, 2 and 4.
        assert_eq!(every.load(Ordering::SeqCst), 3);
        assert_eq!(sim.pending_events(), 1);
        Ok(())
    }

    #[test]
    fn callbacks_can_schedule_events() -> Result<()> {
        let mut sim = small()?;
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        sim.add_event(-1, move |s| {
            let h = h.clone();
            s.add_event(1, move |_| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })?;
        sim.advance_frame()?;
        sim.advance_frame()?;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn failing_event_surfaces_error() -> Result<()> {
        let mut sim = small()?;
        sim.add_event(0, |_| Err(Error::InvalidParam("scene broke".into())))?;
        let err = sim.advance_frame().unwrap_err();
        assert!(err.to_string().contains("scene broke"));
        Ok(())
    }

    fn counter() -> (
        Arc<AtomicUsize>,
        impl FnMut(&mut Simulator) -> Result<()> + Send + 'static,
    ) {
        let runs = Arc::new(AtomicUsize::new(0));
        let c = runs.clone();
        (runs, move |_: &mut Simulator| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn start_events_after_a_failure_still_run() -> Result<()> {
        let mut sim = small()?;
        let (runs, count) = counter();
        sim.add_event(-1, |_| Err(Error::InvalidParam("bad seed".into())))?;
        sim.add_event(-1, count)?;
        assert!(sim.step().is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        for _ in 0..3 {
            sim.advance_frame()?;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(sim.pending_events(), 0);
        Ok(())
    }

    #[test]
    fn frame_events_after_a_failure_still_run() -> Result<()> {
        let mut sim = small()?;
        let (runs, count) = counter();
        sim.add_event(0, |_| Err(Error::InvalidParam("bad frame".into())))?;
        sim.add_event(0, count)?;
        assert!(sim.advance_frame().is_err());
        assert_eq!(sim.frame(), 0);
        for _ in 0..3 {
            sim.advance_frame()?;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(sim.frame(), 3);
        Ok(())
    }

    #[test]
    fn retried_frame_does_not_repeat_periodic_events() -> Result<()> {
        let mut sim = small()?;
        let (runs, count) = counter();
        sim.add_periodic_event(1, count)?;
        sim.add_event(0, |_| Err(Error::InvalidParam("bad frame".into())))?;
        assert!(sim.advance_frame().is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        sim.advance_frame()?;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        sim.advance_frame()?;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn zero_period_is_rejected() -> Result<()> {
        let mut sim = small()?;
        assert!(matches!(
            sim.schedule(Trigger::Every(0), |_| Ok(())),
            Err(Error::InvalidParam(_))
        ));
        assert!(sim.add_periodic_event(0, |_| Ok(())).is_err());
        assert_eq!(sim.pending_events(), 0);
        sim.advance_frame()?;
        Ok(())
    }

    #[test]
    fn dt_respects_the_cap() -> Result<()> {
        let mut sim = Simulator::new(SimulatorConfig {
            resolution: [32, 32],
            initial_dt: 0.1,
            max_delta_t: 0.002,
            seed: Some(1),
            ..Default::default()
        })?;
        sim.add_particles_sphere(
            Vector2::new(0.5, 0.5),
            0.15,
            Material::sand(),
            Vector2::new(0.0, -0.1),
        )?;
        for _ in 0..20 {
            let bound = sim.stable_dt();
            let dt = sim.step()?;
            assert!(dt <= 0.002);
            assert!(dt <= bound * 1.0001, "{dt} > {bound}");
        }
        Ok(())
    }

    #[test]
    fn advance_lands_on_target() -> Result<()> {
        let mut sim = small()?;
        sim.add_particles_sphere(
            Vector2::new(0.5, 0.5),
            0.1,
            Material::elastic(),
            Vector2::zeros(),
        )?;
        sim.advance(0.0123)?;
        assert!((sim.time() - 0.0123).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn levelset_size_is_checked() -> Result<()> {
        let mut sim = small()?;
        let other = LevelSet::new(16, 16, 1.0 / 16.0);
        assert!(matches!(
            sim.set_levelset(other),
            Err(Error::LevelSetMismatch {
                expected: [33, 33],
                found: [17, 17]
            })
        ));
        let own = sim.create_levelset();
        sim.set_levelset(own)?;
        Ok(())
    }

    #[test]
    fn free_fall_matches_gravity() -> Result<()> {
        let mut sim = small()?;
        sim.add_particles_sphere(
            Vector2::new(0.5, 0.6),
            0.08,
            Material::elastic(),
            Vector2::zeros(),
        )?;
        sim.advance(0.05)?;
        let v = sim.particles().momentum() / sim.total_mass();
        assert!((v.y + 9.8 * 0.05).abs() < 0.02, "{v}");
        assert!(v.x.abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn lattice_seeding_is_regular() -> Result<()> {
        let mut sim = small()?;
        let block = shape::Cuboid::new(Vector2::new(0.25, 0.25), Vector2::new(0.5, 0.5));
        let added = sim.add_particles(
            ParticleBatch::new(block, Material::snow(), Vector2::zeros()).lattice(),
        )?;
        // Two points per cell along each axis over an 8x8 cell block.
        assert_eq!(added, 256);
        for p in sim.particles() {
            let k = (p.position - Vector2::repeat(1.0 / 128.0)) * 64.0;
            assert!(k.iter().all(|x| (x - x.round()).abs() < 1e-3), "{}", p.position);
        }
        Ok(())
    }

    #[test]
    fn seeding_density_follows_config() -> Result<()> {
        let mut sim = small()?;
        let added = sim.add_particles_sphere(
            Vector2::new(0.5, 0.5),
            0.2,
            Material::sand(),
            Vector2::zeros(),
        )?;
        let expected = std::f32::consts::PI * 0.04 * 32.0 * 32.0 * 4.0;
        assert!((added as f32 - expected).abs() / expected < 0.05);
        let p = &sim.particles().as_slice()[0];
        assert!((p.volume - 1.0 / (32.0 * 32.0 * 4.0)).abs() < 1e-9);
        assert!((p.mass - p.volume * 2200.0).abs() < 1e-6);
        Ok(())
    }
}
