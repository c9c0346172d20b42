use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Host-visible parameters. Declaration order is also the persisted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamId {
    OutputGain,
    Speed,
    Pitch,
    Throat,
    Mouth,
}

impl ParamId {
    pub const ALL: [ParamId; 5] = [
        ParamId::OutputGain,
        ParamId::Speed,
        ParamId::Pitch,
        ParamId::Throat,
        ParamId::Mouth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// True for the four parameters fed to the speech engine.
    /// Gain is applied at playback and never needs a re-render.
    pub fn is_synthesis(self) -> bool {
        !matches!(self, ParamId::OutputGain)
    }

    pub fn spec(self) -> ParamSpec {
        match self {
            ParamId::OutputGain => ParamSpec::new("Output Gain", 0.0, 200.0, 100.0, false),
            ParamId::Speed => ParamSpec::new("Speed", 0.0, 255.0, 72.0, true),
            ParamId::Pitch => ParamSpec::new("Pitch", 0.0, 255.0, 64.0, true),
            ParamId::Throat => ParamSpec::new("Throat", 0.0, 255.0, 128.0, true),
            ParamId::Mouth => ParamSpec::new("Mouth", 0.0, 255.0, 128.0, true),
        }
    }

    /// Look up a parameter by its display name or a short lowercase alias.
    pub fn from_name(name: &str) -> Option<ParamId> {
        match name.to_ascii_lowercase().as_str() {
            "gain" | "output gain" | "output_gain" => Some(ParamId::OutputGain),
            "speed" => Some(ParamId::Speed),
            "pitch" => Some(ParamId::Pitch),
            "throat" => Some(ParamId::Throat),
            "mouth" => Some(ParamId::Mouth),
            _ => None,
        }
    }
}

/// Static description of a parameter's range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub integer: bool,
}

impl ParamSpec {
    const fn new(name: &'static str, min: f64, max: f64, default: f64, integer: bool) -> Self {
        Self {
            name,
            min,
            max,
            default,
            integer,
        }
    }

    /// Clamp into range, rounding integer parameters.
    pub fn constrain(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        let v = value.clamp(self.min, self.max);
        if self.integer {
            v.round()
        } else {
            v
        }
    }
}

/// The four engine inputs. Values are raw host values; clamp with [`SynthParams::clamped`]
/// before handing them to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthParams {
    pub speed: i32,
    pub pitch: i32,
    pub throat: i32,
    pub mouth: i32,
}

impl SynthParams {
    pub fn clamped(self) -> Self {
        Self {
            speed: self.speed.clamp(0, 255),
            pitch: self.pitch.clamp(0, 255),
            throat: self.throat.clamp(0, 255),
            mouth: self.mouth.clamp(0, 255),
        }
    }
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            speed: ParamId::Speed.spec().default as i32,
            pitch: ParamId::Pitch.spec().default as i32,
            throat: ParamId::Throat.spec().default as i32,
            mouth: ParamId::Mouth.spec().default as i32,
        }
    }
}

/// Host-managed parameter storage.
///
/// Each value is an `f64` kept in an atomic cell, so the audio thread can
/// read the gain without taking a lock.
pub struct ParamStore {
    values: [AtomicU64; 5],
}

impl ParamStore {
    pub fn new() -> Self {
        Self {
            values: ParamId::ALL.map(|id| AtomicU64::new(id.spec().default.to_bits())),
        }
    }

    pub fn get(&self, id: ParamId) -> f64 {
        f64::from_bits(self.values[id.index()].load(Ordering::Acquire))
    }

    /// Store a value, constrained to the parameter's range. Returns the stored value.
    pub fn set(&self, id: ParamId, value: f64) -> f64 {
        let v = id.spec().constrain(value);
        self.values[id.index()].store(v.to_bits(), Ordering::Release);
        v
    }

    /// Output gain as a linear multiplier (percent * 0.01).
    pub fn gain(&self) -> f32 {
        (self.get(ParamId::OutputGain) * 0.01) as f32
    }

    pub fn synth_params(&self) -> SynthParams {
        SynthParams {
            speed: self.get(ParamId::Speed) as i32,
            pitch: self.get(ParamId::Pitch) as i32,
            throat: self.get(ParamId::Throat) as i32,
            mouth: self.get(ParamId::Mouth) as i32,
        }
    }

    /// All values in persisted order.
    pub fn snapshot(&self) -> [f64; 5] {
        ParamId::ALL.map(|id| self.get(id))
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}
