//! Smoke addon
//!
//! Particles rise from the notes that are playing. `smoke.step` advances the
//! simulation by one frame and keeps the particles in the `smoke_cache` data
//! group; drawing them is up to the host.

use pv_core::{Property, PvError, Value};
use pv_plugin::{
    DataGroupMeta, GroupMeta, OperatorMeta, OperatorPlugin, PluginRegistry, PropertyGroup, PropertyGroupPlugin,
    Video,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Fraction of velocity kept after one second
pub const AIR_RESIST: f64 = 0.95;
/// Seconds a particle lives
pub const MAX_AGE: f64 = 6.0;
/// Bound of the velocity settings, pixels per second
pub const MAX_VELOCITY: f64 = 10_000.0;

pub const CACHE: DataGroupMeta = DataGroupMeta::new("smoke_cache", "Simulated smoke particles");

/// Slot in [`CACHE`] holding the [`SmokeState`]
pub const STATE_SLOT: &str = "state";
/// Slot in [`CACHE`] holding the `Vec<Emitter>` for the next frame
pub const EMITTERS_SLOT: &str = "emitters";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Pixels
    pub x: f64,
    pub y: f64,
    /// Pixels per frame
    pub vx: f64,
    pub vy: f64,
    /// Seconds
    pub age: f64,
}

/// Horizontal span of a playing note and the height its particles start at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emitter {
    pub x_start: f64,
    pub x_end: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// New particles per emitter per frame
    pub per_note: usize,
    /// Pixels per second bounds
    pub x_vel: (f64, f64),
    pub y_vel: (f64, f64),
}

impl SimParams {
    /// Read the `smoke` group and the video's frame settings.
    pub fn from_video(video: &Video, settings: &PropertyGroup) -> Result<Self, PvError> {
        let (width, height) = video.resolution();
        let per_note = int_setting(settings, "per_note")?;
        Ok(Self {
            fps: video.fps(),
            width,
            height,
            per_note: usize::try_from(per_note)
                .map_err(|_| PvError::invalid_value(format!("per_note must not be negative, got {}", per_note)))?,
            x_vel: (float_setting(settings, "x_vel_min")?, float_setting(settings, "x_vel_max")?),
            y_vel: (float_setting(settings, "y_vel_min")?, float_setting(settings, "y_vel_max")?),
        })
    }

    fn in_bounds(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < f64::from(self.width) && y < f64::from(self.height)
    }
}

/// Particles carried from one frame to the next
#[derive(Debug, Clone)]
pub struct SmokeState {
    pub particles: Vec<Particle>,
    pub frame: u64,
    rng: StdRng,
}

impl SmokeState {
    pub fn new(seed: u64) -> Self {
        Self { particles: Vec::new(), frame: 0, rng: StdRng::seed_from_u64(seed) }
    }

    /// Simulate one frame: emit, move, drop particles that left the frame
    /// or aged out, then damp the survivors.
    ///
    /// Every sampling span is checked first; on error the state is unchanged.
    pub fn step(&mut self, params: &SimParams, emitters: &[Emitter]) -> Result<(), PvError> {
        if !params.fps.is_finite() || params.fps <= 0.0 {
            return Err(PvError::invalid_value(format!("fps must be positive, got {}", params.fps)));
        }
        let dt = 1.0 / params.fps;
        let (vx_min, vx_max) = (params.x_vel.0 * dt, params.x_vel.1 * dt);
        let (vy_min, vy_max) = (params.y_vel.0 * dt, params.y_vel.1 * dt);
        check_span("x velocity", vx_min, vx_max)?;
        check_span("y velocity", vy_min, vy_max)?;
        for emitter in emitters {
            check_span("emitter x", emitter.x_start, emitter.x_end)?;
            if !emitter.y.is_finite() {
                return Err(PvError::invalid_value(format!("emitter y must be finite, got {}", emitter.y)));
            }
        }

        for emitter in emitters {
            for _ in 0..params.per_note {
                let particle = Particle {
                    x: uniform(&mut self.rng, emitter.x_start, emitter.x_end),
                    y: emitter.y,
                    vx: uniform(&mut self.rng, vx_min, vx_max),
                    vy: uniform(&mut self.rng, vy_min, vy_max),
                    age: 0.0,
                };
                self.particles.push(particle);
            }
        }

        let air_resist = AIR_RESIST.powf(dt);
        self.particles.retain_mut(|p| {
            p.x += p.vx;
            p.y += p.vy;
            if !params.in_bounds(p.x, p.y) || p.age > MAX_AGE {
                return false;
            }
            p.vx *= air_resist;
            p.vy *= air_resist;
            p.age += dt;
            true
        });
        self.frame += 1;
        Ok(())
    }
}

/// A sampling span must have finite ends and a finite width.
fn check_span(what: &str, a: f64, b: f64) -> Result<(), PvError> {
    if a.is_finite() && b.is_finite() && (b - a).is_finite() {
        Ok(())
    } else {
        Err(PvError::invalid_value(format!("{} span [{}, {}] is not finite", what, a, b)))
    }
}

fn uniform(rng: &mut StdRng, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

fn float_setting(settings: &PropertyGroup, name: &str) -> Result<f64, PvError> {
    let value = settings.get(name)?;
    value
        .as_float()
        .ok_or_else(|| PvError::type_mismatch("Float", value.type_name()).with_note(format!("reading 'smoke.{}'", name)))
}

fn int_setting(settings: &PropertyGroup, name: &str) -> Result<i64, PvError> {
    let value = settings.get(name)?;
    value
        .as_int()
        .ok_or_else(|| PvError::type_mismatch("Int", value.type_name()).with_note(format!("reading 'smoke.{}'", name)))
}

// ============ smoke ============

pub struct SmokeSettings;

impl PropertyGroupPlugin for SmokeSettings {
    fn meta(&self) -> GroupMeta {
        GroupMeta {
            idname: "smoke",
            label: "Smoke",
            description: "Smoke rising from played notes",
        }
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("enabled", Property::bool(true).with_label("Enable smoke")),
            (
                "intensity",
                Property::float_range(1.0, 0.0, 10.0)
                    .with_label("Intensity")
                    .with_description("Brightness multiplier of each particle"),
            ),
            (
                "per_note",
                Property::int_range(10, 0, 1000)
                    .with_label("Particles per note")
                    .with_description("New particles per playing note per frame"),
            ),
            ("x_vel_min", Property::float_range(-20.0, -MAX_VELOCITY, MAX_VELOCITY).with_label("Min X velocity")),
            ("x_vel_max", Property::float_range(20.0, -MAX_VELOCITY, MAX_VELOCITY).with_label("Max X velocity")),
            ("y_vel_min", Property::float_range(-120.0, -MAX_VELOCITY, MAX_VELOCITY).with_label("Min Y velocity")),
            ("y_vel_max", Property::float_range(-60.0, -MAX_VELOCITY, MAX_VELOCITY).with_label("Max Y velocity")),
            ("seed", Property::int(0).with_label("Random seed")),
        ]
    }

    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![("max_age", Value::Float(MAX_AGE))]
    }
}

// ============ smoke.step ============

pub struct StepSmoke;

impl OperatorPlugin for StepSmoke {
    fn meta(&self) -> OperatorMeta {
        OperatorMeta {
            group: "smoke",
            idname: "step",
            label: "Simulate frame",
            description: "Advance the smoke simulation by one frame",
        }
    }

    fn execute(&self, video: &Video) -> Result<(), PvError> {
        let group = video.group("smoke")?;
        let settings = group.read();
        if settings.get("enabled")?.as_bool() != Some(true) {
            debug!("smoke disabled, skipping step");
            return Ok(());
        }
        let params = SimParams::from_video(video, &settings)?;
        let seed = int_setting(&settings, "seed")?;
        drop(settings);

        let cache = video.data(CACHE.idname)?;
        let mut state = match cache.get::<SmokeState>(STATE_SLOT) {
            Ok(state) => SmokeState::clone(&state),
            Err(e) if e.is_not_found() => SmokeState::new(seed as u64),
            Err(e) => return Err(e),
        };
        let emitters = match cache.get::<Vec<Emitter>>(EMITTERS_SLOT) {
            Ok(emitters) => emitters.to_vec(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        state.step(&params, &emitters)?;
        debug!(frame = state.frame, particles = state.particles.len(), "smoke step");
        cache.set(STATE_SLOT, state)
    }
}

// ============ smoke.clear_cache ============

pub struct ClearCache;

impl OperatorPlugin for ClearCache {
    fn meta(&self) -> OperatorMeta {
        OperatorMeta {
            group: "smoke",
            idname: "clear_cache",
            label: "Clear cache",
            description: "Discard every simulated particle",
        }
    }

    fn execute(&self, video: &Video) -> Result<(), PvError> {
        let cache = video.data(CACHE.idname)?;
        let mut cache = cache.write();
        if cache.contains(STATE_SLOT) {
            cache.remove(STATE_SLOT)?;
        }
        Ok(())
    }
}

pub fn register(registry: &PluginRegistry) -> Result<(), PvError> {
    registry.register_property_group(SmokeSettings)?;
    registry.register_data_group(CACHE)?;
    registry.register_operator(StepSmoke)?;
    registry.register_operator(ClearCache)?;
    Ok(())
}
