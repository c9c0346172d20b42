//! A small letter-to-sound formant engine.
//!
//! Each letter maps to one phone: vowels are a glottal pulse train through two
//! resonators, consonants are buzz or filtered noise, spaces and punctuation
//! are silence. Speed stretches every phone (72 is nominal, larger is
//! slower), pitch sets the glottal period (larger is lower), throat and mouth
//! scale the first and second formant.

use std::f32::consts::PI;

use phrasebox_types::{SynthParams, SOURCE_SAMPLE_RATE};

use super::{SpeechEngine, SynthError, END_MARKER};

const FS: f32 = SOURCE_SAMPLE_RATE as f32;
const NOMINAL_SPEED: f32 = 72.0;
const PEAK: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Articulation {
    Vowel,
    /// Voiced consonant, optionally with frication mixed in.
    Voiced { noise: f32 },
    Fricative,
    /// Closure silence followed by a short noise burst.
    Plosive,
    Pause,
}

#[derive(Debug, Clone, Copy)]
struct Phone {
    kind: Articulation,
    f1: f32,
    f2: f32,
    ms: f32,
    amp: f32,
}

const fn phone(kind: Articulation, f1: f32, f2: f32, ms: f32, amp: f32) -> Phone {
    Phone {
        kind,
        f1,
        f2,
        ms,
        amp,
    }
}

fn phone_for(byte: u8) -> Option<Phone> {
    use Articulation::*;
    let p = match byte {
        b'A' => phone(Vowel, 730.0, 1090.0, 120.0, 1.0),
        b'E' => phone(Vowel, 530.0, 1840.0, 110.0, 1.0),
        b'I' => phone(Vowel, 270.0, 2290.0, 110.0, 0.9),
        b'O' => phone(Vowel, 570.0, 840.0, 120.0, 1.0),
        b'U' => phone(Vowel, 300.0, 870.0, 110.0, 0.9),
        b'Y' => phone(Vowel, 300.0, 2100.0, 100.0, 0.8),
        b'M' => phone(Voiced { noise: 0.0 }, 250.0, 1200.0, 80.0, 0.5),
        b'N' => phone(Voiced { noise: 0.0 }, 250.0, 1700.0, 80.0, 0.5),
        b'L' => phone(Voiced { noise: 0.0 }, 360.0, 1300.0, 70.0, 0.6),
        b'R' => phone(Voiced { noise: 0.0 }, 420.0, 1300.0, 70.0, 0.6),
        b'W' => phone(Voiced { noise: 0.0 }, 300.0, 700.0, 70.0, 0.6),
        b'B' => phone(Voiced { noise: 0.1 }, 200.0, 900.0, 50.0, 0.5),
        b'D' => phone(Voiced { noise: 0.1 }, 200.0, 1700.0, 50.0, 0.5),
        b'G' => phone(Voiced { noise: 0.1 }, 200.0, 2000.0, 50.0, 0.5),
        b'J' => phone(Voiced { noise: 0.4 }, 250.0, 2200.0, 70.0, 0.5),
        b'V' => phone(Voiced { noise: 0.4 }, 220.0, 1100.0, 70.0, 0.5),
        b'Z' => phone(Voiced { noise: 0.5 }, 220.0, 4000.0, 80.0, 0.5),
        b'F' => phone(Fricative, 0.0, 3000.0, 90.0, 0.35),
        b'H' => phone(Fricative, 0.0, 1500.0, 60.0, 0.25),
        b'S' | b'C' => phone(Fricative, 0.0, 4500.0, 100.0, 0.45),
        b'X' => phone(Fricative, 0.0, 3500.0, 110.0, 0.45),
        b'P' => phone(Plosive, 0.0, 1000.0, 70.0, 0.5),
        b'T' => phone(Plosive, 0.0, 3000.0, 70.0, 0.5),
        b'K' | b'Q' => phone(Plosive, 0.0, 2000.0, 80.0, 0.5),
        b' ' | b'-' => phone(Pause, 0.0, 0.0, 60.0, 0.0),
        b',' | b';' | b':' => phone(Pause, 0.0, 0.0, 150.0, 0.0),
        b'.' | b'!' | b'?' => phone(Pause, 0.0, 0.0, 250.0, 0.0),
        _ => return None,
    };
    Some(p)
}

/// Two-pole resonator.
#[derive(Debug, Clone, Copy, Default)]
struct Resonator {
    a1: f32,
    a2: f32,
    gain: f32,
    y1: f32,
    y2: f32,
}

impl Resonator {
    fn new(freq: f32, bandwidth: f32) -> Self {
        let freq = freq.clamp(50.0, FS * 0.45);
        let r = (-PI * bandwidth / FS).exp();
        Self {
            a1: 2.0 * r * (2.0 * PI * freq / FS).cos(),
            a2: -r * r,
            gain: 1.0 - r,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.gain * x + self.a1 * self.y1 + self.a2 * self.y2;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Deterministic noise so identical input renders identical audio.
#[derive(Debug, Clone, Copy)]
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / (1u32 << 23) as f32 - 1.0
    }
}

/// Linear fade over the first and last tenth of a segment.
fn envelope(i: usize, len: usize) -> f32 {
    let edge = (len / 10).max(1) as f32;
    let from_start = i as f32 / edge;
    let from_end = (len - i) as f32 / edge;
    from_start.min(from_end).min(1.0)
}

#[derive(Debug, Default)]
pub struct FormantEngine;

impl FormantEngine {
    pub fn new() -> Self {
        Self
    }
}

struct Voice {
    period: f32,
    phase: f32,
    stretch: f32,
    f1_scale: f32,
    f2_scale: f32,
    noise: Noise,
}

impl Voice {
    fn new(params: SynthParams) -> Self {
        Self {
            period: 60.0 + params.pitch as f32 * 0.75,
            phase: 0.0,
            stretch: (params.speed as f32 / NOMINAL_SPEED).max(0.25),
            f1_scale: 0.5 + params.throat as f32 / 255.0,
            f2_scale: 0.5 + params.mouth as f32 / 255.0,
            noise: Noise(0x5eed),
        }
    }

    fn pulse(&mut self) -> f32 {
        self.phase += 1.0;
        if self.phase >= self.period {
            self.phase -= self.period;
            1.0
        } else {
            0.0
        }
    }

    fn render_phone(&mut self, p: Phone, out: &mut Vec<f32>) {
        let len = ((p.ms / 1000.0) * FS * self.stretch).round().max(1.0) as usize;
        let mut r1 = Resonator::new(p.f1 * self.f1_scale, 90.0);
        let mut r2 = Resonator::new(p.f2 * self.f2_scale, 140.0);
        let mut hiss = Resonator::new(p.f2 * self.f2_scale, 1200.0);

        for i in 0..len {
            let env = envelope(i, len) * p.amp;
            let s = match p.kind {
                Articulation::Vowel => {
                    let x = self.pulse() * 40.0;
                    r1.process(x) + 0.6 * r2.process(x)
                }
                Articulation::Voiced { noise } => {
                    let x = self.pulse() * 40.0;
                    let buzz = r1.process(x) + 0.4 * r2.process(x);
                    buzz + noise * hiss.process(self.noise.next() * 4.0)
                }
                Articulation::Fricative => hiss.process(self.noise.next() * 4.0),
                Articulation::Plosive => {
                    if i < len * 6 / 10 {
                        0.0
                    } else {
                        hiss.process(self.noise.next() * 6.0)
                    }
                }
                Articulation::Pause => 0.0,
            };
            out.push(s * env);
        }
    }
}

impl SpeechEngine for FormantEngine {
    fn render(&mut self, input: &[u8], params: SynthParams) -> Result<Vec<u8>, SynthError> {
        let text = input
            .iter()
            .take_while(|&&b| b != END_MARKER && b != 0)
            .copied();

        let phones: Vec<Phone> = text.filter_map(phone_for).collect();
        if phones.iter().all(|p| p.kind == Articulation::Pause) {
            return Err(SynthError::NoPhonemes);
        }

        let mut voice = Voice::new(params);
        let mut signal = Vec::new();
        for p in phones {
            voice.render_phone(p, &mut signal);
        }
        if signal.is_empty() {
            return Err(SynthError::EmptyOutput);
        }

        let peak = signal.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let scale = if peak > 0.0 { PEAK / peak } else { 0.0 };
        Ok(signal
            .iter()
            .map(|s| (128.0 + s * scale * 127.0).round().clamp(0.0, 255.0) as u8)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::prepare_input;

    fn render(text: &str, params: SynthParams) -> Result<Vec<u8>, SynthError> {
        FormantEngine::new().render(&prepare_input(text), params)
    }

    #[test]
    fn pronounceable_text_renders() {
        let pcm = render("HELLO FROM PHRASEBOX", SynthParams::default()).unwrap();
        assert!(!pcm.is_empty());
        assert!(pcm.iter().any(|&s| s != 128));
    }

    #[test]
    fn nothing_pronounceable_fails() {
        assert_eq!(render("123 ,.!", SynthParams::default()), Err(SynthError::NoPhonemes));
        assert_eq!(render("", SynthParams::default()), Err(SynthError::NoPhonemes));
    }

    #[test]
    fn higher_speed_value_is_slower() {
        let slow = SynthParams {
            speed: 144,
            ..SynthParams::default()
        };
        let nominal = render("HELLO", SynthParams::default()).unwrap();
        let stretched = render("HELLO", slow).unwrap();
        assert!(stretched.len() > nominal.len() * 3 / 2);
    }

    #[test]
    fn zero_speed_still_renders() {
        let fast = SynthParams {
            speed: 0,
            ..SynthParams::default()
        };
        assert!(!render("A", fast).unwrap().is_empty());
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render("SISTER", SynthParams::default()).unwrap();
        let b = render("SISTER", SynthParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pitch_changes_the_waveform() {
        let low = SynthParams {
            pitch: 200,
            ..SynthParams::default()
        };
        let a = render("AAA", SynthParams::default()).unwrap();
        let b = render("AAA", low).unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn stops_at_end_marker() {
        let mut input = prepare_input("A");
        input.extend_from_slice(b"SSSSSSSS");
        let short = FormantEngine::new()
            .render(&input, SynthParams::default())
            .unwrap();
        assert_eq!(short, render("A", SynthParams::default()).unwrap());
    }
}
