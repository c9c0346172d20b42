//! Controller and audio processor driven together, the way a host does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use phrasebox_audio::AudioProcessor;
use phrasebox_core::synth::{FormantEngine, ScriptedEngine, SynthError};
use phrasebox_core::{ControllerOptions, PhraseController};
use phrasebox_types::{ParamId, PlaybackStatus, SOURCE_SAMPLE_RATE};

fn unit_step_options() -> ControllerOptions {
    ControllerOptions {
        host_rate: SOURCE_SAMPLE_RATE,
        ..ControllerOptions::default()
    }
}

fn block(proc: &mut AudioProcessor, channels: usize, frames: usize) -> Vec<Vec<f32>> {
    let mut bufs = vec![vec![0.0f32; frames]; channels];
    {
        let mut outs: Vec<&mut [f32]> = bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
        proc.process_block(&mut outs, frames);
    }
    bufs
}

#[test]
fn interpolated_output_matches_centered_samples() {
    let engine = ScriptedEngine::always(vec![128, 128, 255, 0]);
    let (c, mut proc) = PhraseController::new(Box::new(engine), unit_step_options());
    assert!(c.request_playback());

    let dc = c.current_render().dc_bias();
    let expected: Vec<f32> = [0.0f32, 0.0, 127.0 / 128.0, -1.0]
        .iter()
        .map(|v| (v - dc).clamp(-1.0, 1.0))
        .collect();
    let out = block(&mut proc, 2, 6);
    assert_eq!(out[0], out[1]);
    for (got, want) in out[0][..4].iter().zip(&expected) {
        assert!((got - want).abs() < 1e-6, "got {} want {}", got, want);
    }
    assert_eq!(out[0][4..].to_vec(), vec![0.0f32, 0.0]);
}

#[test]
fn playback_ends_within_ceil_n_over_s_frames() {
    let pcm: Vec<u8> = (0..301).map(|i| (i % 200) as u8 + 20).collect();
    let engine = ScriptedEngine::always(pcm);
    let options = ControllerOptions {
        host_rate: 48_000.0,
        ..ControllerOptions::default()
    };
    let (c, mut proc) = PhraseController::new(Box::new(engine), options);
    c.request_playback();

    let step = SOURCE_SAMPLE_RATE / 48_000.0;
    let bound = (301.0 / step).ceil() as usize;
    let out = block(&mut proc, 1, bound + 64);
    let audible = out[0].iter().rposition(|&s| s != 0.0).map_or(0, |i| i + 1);
    assert!(audible > 0);
    assert!(audible <= bound);
    assert!(!proc.is_playing());
    assert!(block(&mut proc, 1, 32)[0].iter().all(|&s| s == 0.0));
}

#[test]
fn failed_rerender_keeps_stale_audio_playing() {
    let engine = ScriptedEngine::failing();
    engine.push(Ok((0..1000).map(|i| (i % 256) as u8).collect()));
    let (c, mut proc) = PhraseController::new(Box::new(engine.clone()), unit_step_options());
    c.on_text_committed("FIRST").unwrap();
    block(&mut proc, 1, 100);
    assert!(proc.is_playing());

    assert_eq!(c.on_text_committed("SECOND"), Err(SynthError::NoPhonemes));
    assert_eq!(c.current_render().len(), 1000);
    assert!(c.is_dirty());
    let cursor_before = proc.reader().cursor();
    block(&mut proc, 1, 100);
    assert!(proc.is_playing());
    assert_eq!(proc.reader().cursor(), cursor_before + 100.0);
}

#[test]
fn always_failing_engine_never_plays() {
    let engine = ScriptedEngine::failing();
    let (c, mut proc) = PhraseController::new(Box::new(engine.clone()), unit_step_options());
    for _ in 0..10 {
        assert!(!c.request_playback());
        assert!(block(&mut proc, 2, 32).iter().flatten().all(|&s| s == 0.0));
        assert!(!proc.is_playing());
    }
    assert_eq!(engine.call_count(), 10);
    assert_eq!(c.request_count(), 10);
}

#[test]
fn status_follows_acknowledgements() {
    let engine = ScriptedEngine::always(vec![1, 2, 3]);
    let (c, mut proc) = PhraseController::new(Box::new(engine), unit_step_options());
    let mut observer = c.status_observer();
    assert_eq!(c.status(), PlaybackStatus::Idle);

    c.request_playback();
    assert_eq!(c.status(), PlaybackStatus::Pending(1));
    assert_eq!(observer.poll(), None);

    block(&mut proc, 1, 4);
    assert_eq!(observer.poll(), Some(PlaybackStatus::Acknowledged(1)));
    assert_eq!(c.status().to_string(), "Playback request #1 acknowledged");
}

#[test]
fn rapid_requests_read_as_pending_until_acknowledged() {
    let engine = ScriptedEngine::always(vec![1, 2, 3]);
    let (c, mut proc) = PhraseController::new(Box::new(engine), unit_step_options());
    let mut observer = c.status_observer();

    c.request_playback();
    c.request_playback();
    c.request_playback();
    block(&mut proc, 1, 4);

    assert_eq!(c.request_count(), 3);
    assert_eq!(c.ack_count(), 1);
    assert_eq!(observer.poll(), Some(PlaybackStatus::Pending(3)));
    assert_eq!(c.status().to_string(), "Playback request #3 pending DSP ack");
}

#[test]
fn param_change_rerenders_on_next_trigger() {
    let engine = ScriptedEngine::always(vec![1, 2, 3]);
    let (c, _proc) = PhraseController::new(Box::new(engine.clone()), unit_step_options());
    c.request_playback();
    c.request_playback();
    assert_eq!(engine.call_count(), 1);

    c.set_param(ParamId::Speed, 100.0);
    c.request_playback();
    assert_eq!(engine.call_count(), 2);
    assert_eq!(engine.calls()[1].params.speed, 100);
}

#[test]
fn acks_never_exceed_requests_under_contention() {
    let engine = ScriptedEngine::always(vec![128; 64]);
    let (c, mut proc) = PhraseController::new(Box::new(engine), unit_step_options());
    let c = Arc::new(c);
    let done = Arc::new(AtomicBool::new(false));

    let audio = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut buf = vec![0.0f32; 16];
            while !done.load(Ordering::Acquire) {
                let mut outs: Vec<&mut [f32]> = vec![buf.as_mut_slice()];
                proc.process_block(&mut outs, 16);
            }
            proc
        })
    };

    let triggers: Vec<_> = (0..3)
        .map(|_| {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                for _ in 0..300 {
                    c.request_playback();
                }
            })
        })
        .collect();

    let watcher = {
        let c = Arc::clone(&c);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let acks = c.ack_count();
                let requests = c.request_count();
                assert!(acks <= requests, "acks {} > requests {}", acks, requests);
            }
        })
    };

    for t in triggers {
        t.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let mut proc = audio.join().unwrap();
    watcher.join().unwrap();

    // One more block drains any pending trigger left over.
    block(&mut proc, 1, 16);
    assert_eq!(c.request_count(), 900);
    assert!(c.ack_count() >= 1);
    assert!(c.ack_count() <= 900);
}

#[test]
fn built_in_engine_plays_the_fallback_phrase() {
    let (c, mut proc) = PhraseController::new(
        Box::new(FormantEngine::new()),
        ControllerOptions {
            initial_text: String::new(),
            ..ControllerOptions::default()
        },
    );
    assert!(c.request_playback());
    assert!(!c.current_render().is_empty());
    let out = block(&mut proc, 1, 2048);
    assert!(proc.is_playing());
    assert!(out[0].iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(out[0].iter().any(|&s| s != 0.0));
}
