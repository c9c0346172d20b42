use std::path::{Path, PathBuf};

use serde::Deserialize;

use phrasebox_types::{
    truncate_to_bound, ParamId, FALLBACK_PHRASE, MAX_PHRASE_LEN, NOMINAL_HOST_RATE,
};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    state: StateConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    phrase: Option<String>,
    speed: Option<f64>,
    pitch: Option<f64>,
    throat: Option<f64>,
    mouth: Option<f64>,
    output_gain: Option<f64>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    nominal_sample_rate: Option<f64>,
    output_device: Option<String>,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    port: Option<usize>,
}

#[derive(Deserialize, Default)]
struct StateConfig {
    autosave: Option<bool>,
}

pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        let user = user_config_path().filter(|p| p.exists());
        Self::load_from(user.as_deref())
    }

    /// Embedded defaults merged with `user_path`. Unreadable or malformed
    /// user files are logged and ignored.
    pub fn load_from(user_path: Option<&Path>) -> Self {
        let mut base = parse_embedded();

        if let Some(path) = user_path {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                    Ok(user) => merge(&mut base, user),
                    Err(e) => {
                        log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                    }
                },
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                }
            }
        }

        Config { file: base }
    }

    /// Initial phrase, bounded like any other phrase. Empty means the
    /// fallback phrase.
    pub fn default_phrase(&self) -> String {
        match self.file.defaults.phrase.as_deref() {
            Some(p) if !p.is_empty() => truncate_to_bound(p, MAX_PHRASE_LEN).to_string(),
            _ => FALLBACK_PHRASE.to_string(),
        }
    }

    /// Initial value of `id`, constrained to its range.
    pub fn default_param(&self, id: ParamId) -> f64 {
        let d = &self.file.defaults;
        let value = match id {
            ParamId::OutputGain => d.output_gain,
            ParamId::Speed => d.speed,
            ParamId::Pitch => d.pitch,
            ParamId::Throat => d.throat,
            ParamId::Mouth => d.mouth,
        };
        let spec = id.spec();
        spec.constrain(value.unwrap_or(spec.default))
    }

    pub fn nominal_sample_rate(&self) -> f64 {
        self.file
            .audio
            .nominal_sample_rate
            .filter(|r| r.is_finite() && *r > 1.0)
            .unwrap_or(NOMINAL_HOST_RATE)
    }

    pub fn output_device(&self) -> Option<&str> {
        self.file.audio.output_device.as_deref()
    }

    pub fn midi_port(&self) -> Option<usize> {
        self.file.midi.port
    }

    pub fn autosave_enabled(&self) -> bool {
        self.file.state.autosave.unwrap_or(true)
    }
}

fn parse_embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(file) => file,
        Err(e) => {
            log::error!(target: "config", "embedded config.toml is malformed: {}", e);
            ConfigFile::default()
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    crate::paths::config_dir().map(|d| d.join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    let (d, u) = (&mut base.defaults, user.defaults);
    if u.phrase.is_some() {
        d.phrase = u.phrase;
    }
    if u.speed.is_some() {
        d.speed = u.speed;
    }
    if u.pitch.is_some() {
        d.pitch = u.pitch;
    }
    if u.throat.is_some() {
        d.throat = u.throat;
    }
    if u.mouth.is_some() {
        d.mouth = u.mouth;
    }
    if u.output_gain.is_some() {
        d.output_gain = u.output_gain;
    }

    if user.audio.nominal_sample_rate.is_some() {
        base.audio.nominal_sample_rate = user.audio.nominal_sample_rate;
    }
    if user.audio.output_device.is_some() {
        base.audio.output_device = user.audio.output_device;
    }
    if user.midi.port.is_some() {
        base.midi.port = user.midi.port;
    }
    if user.state.autosave.is_some() {
        base.state.autosave = user.state.autosave;
    }
}
