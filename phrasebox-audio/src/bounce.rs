//! Offline bounce of a render through the playback reader.

use std::path::Path;

use phrasebox_types::RenderedAudio;

use crate::reader::{effective_host_rate, PlaybackReader};

/// Play `audio` from the start at `host_rate` and collect every frame until
/// the reader goes idle.
pub fn bounce_samples(audio: &RenderedAudio, host_rate: f64, gain: f32) -> Vec<f32> {
    let mut reader = PlaybackReader::new(host_rate);
    reader.restart(audio);

    let expected = (audio.len() as f64 / reader.step()).ceil() as usize;
    let mut out = Vec::with_capacity(expected);
    while reader.is_playing() {
        out.push(reader.next_sample(audio) * gain);
    }
    out
}

/// Write the bounced phrase as a mono 32-bit float WAV. Returns the frame count.
pub fn bounce_to_wav(
    audio: &RenderedAudio,
    host_rate: f64,
    gain: f32,
    path: &Path,
) -> Result<usize, String> {
    let rate = effective_host_rate(host_rate);
    let samples = bounce_samples(audio, rate, gain);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Cannot create {}: {}", path.display(), e))?;
    for &s in &samples {
        writer
            .write_sample(s)
            .map_err(|e| format!("Write failed for {}: {}", path.display(), e))?;
    }
    writer
        .finalize()
        .map_err(|e| format!("Cannot finalize {}: {}", path.display(), e))?;

    log::info!(
        target: "audio::bounce",
        "bounced {} frames at {} Hz to {}",
        samples.len(),
        spec.sample_rate,
        path.display()
    );
    Ok(samples.len())
}
