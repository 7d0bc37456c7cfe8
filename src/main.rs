//! Putt Core - headless demo
//!
//! Plays a small built-in course with a seeded autoplayer and logs what
//! happens. Usage: `putt-core [seed] [config.json]`

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::{Quat, Vec3};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use putt_core::consts::SIM_DT;
    use putt_core::sim::{
        Course, EventKind, GameEvent, GamePhase, GroundPlaneWorld, HoleLayout, Session,
    };
    use putt_core::{Result, SimConfig};

    const COURSE: &str = r#"{
        "holes": [
            {
                "name": "Sandy Straight",
                "par": 2,
                "tee": [0.0, 0.05, 8.0],
                "target": {
                    "position": [0.0, 0.0, -8.0],
                    "capture_radius": 0.3,
                    "capture_depth_below_surface": 0.1
                },
                "playfield": { "min": [-6.0, -12.0], "max": [6.0, 12.0] },
                "hazards": [
                    {
                        "kind": "Bunker",
                        "bounds": { "min": [-1.0, -1.0, -3.0], "max": [1.0, 0.2, -1.0] }
                    },
                    {
                        "kind": "OutOfBounds",
                        "bounds": { "min": [4.0, -1.0, -12.0], "max": [6.0, 1.0, 12.0] },
                        "penalty_strokes": 1
                    }
                ]
            },
            {
                "name": "The Pond",
                "par": 3,
                "tee": [-9.0, 0.05, 0.0],
                "target": {
                    "position": [9.0, 0.0, 1.0],
                    "capture_radius": 0.3,
                    "capture_depth_below_surface": 0.1
                },
                "playfield": { "min": [-12.0, -6.0], "max": [12.0, 6.0] },
                "hazards": [
                    {
                        "kind": "Water",
                        "bounds": { "min": [-2.0, -1.0, -2.0], "max": [2.0, 0.1, 2.0] },
                        "penalty_strokes": 1
                    }
                ]
            }
        ]
    }"#;

    const MAX_STROKES_PER_HOLE: u32 = 10;
    const MAX_TICKS_PER_SHOT: u32 = 60 * 30;

    /// Aims at the cup with a little seeded error in line and weight
    struct AutoPlayer {
        rng: Pcg32,
    }

    impl AutoPlayer {
        fn new(seed: u64) -> Self {
            Self {
                rng: Pcg32::seed_from_u64(seed),
            }
        }

        fn shot(&mut self, config: &SimConfig, from: Vec3, to: Vec3, damping: f32) -> (Vec3, f32) {
            let line = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
            let distance = line.length();

            // Rolling distance per unit of launch speed under exponential damping
            let q = (1.0 - damping).powf(SIM_DT);
            let reach = SIM_DT * q / (1.0 - q);
            let impulse = config.ball.mass * distance / reach;
            let power = (impulse / config.hit.max_impulse).powf(1.0 / config.hit.power_exponent);

            let angle = self.rng.random_range(-0.04..0.04);
            let weight = self.rng.random_range(0.92..1.08);
            let direction = Quat::from_rotation_y(angle) * line.normalize_or_zero();
            (direction, (power * weight).clamp(0.05, 1.0))
        }
    }

    fn play_hole(
        session: &mut Session<GroundPlaneWorld>,
        player: &mut AutoPlayer,
        hole: std::rc::Rc<HoleLayout>,
    ) -> Result<()> {
        let target = hole.target.position;
        session.load_hole(hole)?;

        for _ in 0..MAX_STROKES_PER_HOLE {
            let Some(ball) = session.ball() else {
                break;
            };
            let (direction, power) = player.shot(
                session.config(),
                ball.position(),
                target,
                ball.surface_damping(),
            );
            if let Err(e) = session.hit(direction, power) {
                log::warn!("Shot refused: {e}");
                break;
            }

            let mut ticks = 0;
            while session.phase() == GamePhase::BallInMotion && ticks < MAX_TICKS_PER_SHOT {
                session.tick(SIM_DT);
                ticks += 1;
            }
            if session.phase() == GamePhase::BallInMotion {
                log::warn!("Shot still rolling after {} ticks, resetting", ticks);
                session.reset_ball()?;
            }
            if session.phase() == GamePhase::HoleCompleted {
                return Ok(());
            }
        }
        log::warn!("Picked up after {} strokes", MAX_STROKES_PER_HOLE);
        Ok(())
    }

    pub fn run() -> Result<()> {
        let mut args = std::env::args().skip(1);
        let seed = args
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0x5eed_0001);
        let config = match args.next() {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        let course = Course::from_json(COURSE)?;
        let mut session = Session::new(config, GroundPlaneWorld::default())?;
        for kind in [
            EventKind::HazardDetected,
            EventKind::BunkerEntered,
            EventKind::BallInHole,
            EventKind::BallStopped,
        ] {
            session.subscribe(kind, "demo-log", |env, _| {
                match &env.event {
                    GameEvent::HazardDetected { kind, penalty, .. } => {
                        log::info!("Hazard: {:?} (+{})", kind, penalty)
                    }
                    GameEvent::BunkerEntered { position } => {
                        log::info!("In the sand at {position}")
                    }
                    GameEvent::BallInHole => log::info!("In the cup!"),
                    GameEvent::BallStopped { position } => log::debug!("Stopped at {position}"),
                    _ => {}
                }
                Ok(())
            });
        }

        log::info!("Playing {} hole(s) with seed {}", course.holes.len(), seed);
        let mut player = AutoPlayer::new(seed);
        for hole in &course.holes {
            play_hole(&mut session, &mut player, std::rc::Rc::clone(hole))?;
        }

        for failure in session.bus_mut().take_failures() {
            log::warn!("{failure}");
        }
        let card = session.ledger().scorecard();
        for score in &card.entries {
            log::info!(
                "{:<14} par {}  strokes {}  {}",
                score.hole,
                score.par,
                score.strokes,
                score.label()
            );
        }
        log::info!(
            "Total {} strokes ({:+} to par)",
            session.ledger().total_strokes(),
            card.total_to_par()
        );
        match card.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Could not serialize scorecard: {e}"),
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Putt Core (headless) starting...");

    if let Err(e) = demo::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
