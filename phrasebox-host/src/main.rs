mod commands;

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use phrasebox_audio::bounce::bounce_to_wav;
use phrasebox_audio::output::list_output_devices;
use phrasebox_audio::{AudioProcessor, OutputStream};
use phrasebox_core::config::Config;
use phrasebox_core::midi::{self, MidiInputManager};
use phrasebox_core::paths;
use phrasebox_core::synth::FormantEngine;
use phrasebox_core::{ControllerOptions, PhraseController};
use phrasebox_types::ParamId;

use commands::{parse_command, Command, HELP};

const NULL_BLOCK_FRAMES: usize = 512;

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = paths::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create("/tmp/phrasebox.log").expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("phrasebox starting (log level: {:?})", log_level);
}

struct Args {
    verbose: bool,
    state_path: PathBuf,
    no_audio: bool,
    midi_port: Option<usize>,
    bounce: Option<PathBuf>,
}

fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let midi_port = match flag_value(args, &["--midi"]) {
        Some(s) => Some(s.parse().map_err(|_| format!("--midi expects a port index, got {}", s))?),
        None => None,
    };
    Ok(Args {
        verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
        state_path: flag_value(args, &["--state"])
            .map(PathBuf::from)
            .unwrap_or_else(paths::default_state_path),
        no_audio: args.iter().any(|a| a == "--no-audio"),
        midi_port,
        bounce: flag_value(args, &["--bounce"]).map(PathBuf::from),
    })
}

fn main() {
    let raw: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let config = Config::load();
    let options = ControllerOptions {
        initial_text: config.default_phrase(),
        host_rate: config.nominal_sample_rate(),
        ..ControllerOptions::default()
    };
    let (controller, processor) = PhraseController::new(Box::new(FormantEngine::new()), options);
    for id in ParamId::ALL {
        controller.set_param(id, config.default_param(id));
    }

    if args.state_path.exists() {
        if let Err(e) = controller.load_from(&args.state_path) {
            log::warn!("{}", e);
        }
    } else {
        controller.reset();
    }

    if let Some(path) = &args.bounce {
        return bounce(&controller, &config, path);
    }

    let controller = Arc::new(controller);
    let running = Arc::new(AtomicBool::new(true));

    let _output = if args.no_audio {
        spawn_null_output(processor, config.nominal_sample_rate(), Arc::clone(&running));
        None
    } else {
        match OutputStream::open(config.output_device(), processor) {
            Ok(stream) => {
                println!(
                    "Audio: {} ({} Hz, {} ch)",
                    stream.device_name(),
                    stream.sample_rate(),
                    stream.channels()
                );
                Some(stream)
            }
            Err(e) => {
                log::error!(target: "audio::output", "{}", e);
                eprintln!("Audio output unavailable: {}", e);
                None
            }
        }
    };

    let mut midi_in = MidiInputManager::new();
    spawn_midi_listener(&midi_in, Arc::clone(&controller));
    if let Some(port) = args.midi_port.or(config.midi_port()) {
        match midi_in.connect(port) {
            Ok(()) => println!("MIDI: {}", midi_in.port_name().unwrap_or("?")),
            Err(e) => eprintln!("MIDI port {}: {}", port, e),
        }
    }

    let result = repl(&controller, &config, &args.state_path, &mut midi_in);

    running.store(false, Ordering::Release);
    if config.autosave_enabled() {
        if let Err(e) = controller.save_to(&args.state_path) {
            eprintln!("{}", e);
        }
    }
    result
}

fn repl(
    controller: &PhraseController,
    config: &Config,
    state_path: &Path,
    midi_in: &mut MidiInputManager,
) -> Result<(), String> {
    let mut observer = controller.status_observer();
    println!("Phrase: {}", controller.text());
    println!("Type a phrase to render it, /help for commands.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(format!("stdin: {}", e)),
            None => return Ok(()),
        };

        match parse_command(&line) {
            Ok(Command::Quit) => return Ok(()),
            Ok(cmd) => execute(cmd, controller, config, state_path, midi_in),
            Err(e) => println!("{}", e),
        }

        // Give the audio thread a block to acknowledge before polling.
        thread::sleep(Duration::from_millis(20));
        if let Some(status) = observer.poll() {
            println!("{}", status);
        }
    }
}

fn execute(
    cmd: Command,
    controller: &PhraseController,
    config: &Config,
    state_path: &Path,
    midi_in: &mut MidiInputManager,
) {
    match cmd {
        Command::Commit(text) => match controller.on_text_committed(&text) {
            Ok(_) => println!("Rendered: {}", controller.text()),
            Err(e) => println!("Render failed: {}", e),
        },
        Command::Edit(text) => controller.on_text_edited(&text),
        Command::Play => {
            if !controller.request_playback() {
                println!("Nothing to play");
            }
            println!("{}", controller.status());
        }
        Command::Set(id, value) => {
            let stored = controller.set_param(id, value);
            println!("{} = {}", id.spec().name, stored);
        }
        Command::Status => {
            println!("Phrase: {}", controller.text());
            for id in ParamId::ALL {
                println!("  {:<12} {}", id.spec().name, controller.param(id));
            }
            println!(
                "  render: {} samples{}",
                controller.current_render().len(),
                if controller.is_dirty() { " (stale)" } else { "" }
            );
            println!("{}", controller.status());
        }
        Command::Save => match controller.save_to(state_path) {
            Ok(()) => println!("Saved {}", state_path.display()),
            Err(e) => println!("{}", e),
        },
        Command::Load => match controller.load_from(state_path) {
            Ok(()) => println!("Loaded: {}", controller.text()),
            Err(e) => println!("{}", e),
        },
        Command::Bounce(path) => {
            if let Err(e) = bounce(controller, config, &path) {
                println!("{}", e);
            }
        }
        Command::ListDevices => {
            let devices = list_output_devices();
            if devices.is_empty() {
                println!("No audio outputs");
            }
            for d in devices {
                println!("  {}{}", d.name, if d.is_default { " (default)" } else { "" });
            }
        }
        Command::ListMidi => {
            let ports = midi::list_ports();
            if ports.is_empty() {
                println!("No MIDI inputs");
            }
            for p in ports {
                println!("  {}: {}", p.index, p.name);
            }
        }
        Command::ConnectMidi(port) => match midi_in.connect(port) {
            Ok(()) => println!("MIDI: {}", midi_in.port_name().unwrap_or("?")),
            Err(e) => println!("{}", e),
        },
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn bounce(controller: &PhraseController, config: &Config, path: &Path) -> Result<(), String> {
    controller.ensure_rendered().map_err(|e| e.to_string())?;
    let render = controller.current_render();
    let gain = controller.params().gain();
    let frames = bounce_to_wav(&render, config.nominal_sample_rate(), gain, path)?;
    println!("Bounced {} frames to {}", frames, path.display());
    Ok(())
}

/// Note-ons arrive on the MIDI input thread's channel; trigger from a
/// dedicated control thread so synthesis never runs in the driver callback.
fn spawn_midi_listener(midi_in: &MidiInputManager, controller: Arc<PhraseController>) {
    let events = midi_in.events();
    thread::spawn(move || {
        for event in events.iter() {
            controller.on_midi(&event);
        }
    });
}

/// Drive the processor against a wall clock when there is no audio device,
/// so triggers still get acknowledged.
fn spawn_null_output(mut processor: AudioProcessor, rate: f64, running: Arc<AtomicBool>) {
    processor.set_sample_rate(rate);
    let period = Duration::from_secs_f64(NULL_BLOCK_FRAMES as f64 / rate);
    thread::spawn(move || {
        let mut buf = vec![0.0f32; NULL_BLOCK_FRAMES];
        while running.load(Ordering::Acquire) {
            processor.process_interleaved(&mut buf, 1);
            thread::sleep(period);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags() {
        let a = parse_args(&args(&[
            "phrasebox", "-v", "--state", "/tmp/s.bin", "--no-audio", "--midi", "1", "--bounce", "o.wav",
        ]))
        .unwrap();
        assert!(a.verbose);
        assert!(a.no_audio);
        assert_eq!(a.state_path, PathBuf::from("/tmp/s.bin"));
        assert_eq!(a.midi_port, Some(1));
        assert_eq!(a.bounce, Some(PathBuf::from("o.wav")));
    }

    #[test]
    fn defaults_without_flags() {
        let a = parse_args(&args(&["phrasebox"])).unwrap();
        assert!(!a.verbose);
        assert!(!a.no_audio);
        assert_eq!(a.midi_port, None);
        assert_eq!(a.state_path, paths::default_state_path());
    }

    #[test]
    fn bad_midi_port_is_an_error() {
        assert!(parse_args(&args(&["phrasebox", "--midi", "x"])).is_err());
    }

    #[test]
    fn bounce_writes_the_rendered_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrase.wav");
        let (controller, _proc) =
            PhraseController::new(Box::new(FormantEngine::new()), ControllerOptions::default());
        let config = Config::load_from(None);
        bounce(&controller, &config, &path).unwrap();
        assert!(path.exists());
    }
}
