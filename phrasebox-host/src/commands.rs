//! Prompt commands. A plain line commits the phrase, `/`-prefixed lines are
//! commands.

use std::path::PathBuf;

use phrasebox_types::ParamId;

pub const HELP: &str = "\
<text>               commit phrase and render
/edit <text>         update phrase without rendering
/play                trigger playback
/set <param> <value> set gain|speed|pitch|throat|mouth
/status              show phrase, parameters and playback status
/save, /load         write or read the state file
/bounce <path>       render the phrase to a WAV file
/devices             list audio output devices
/midi [port]         list MIDI inputs, or connect to one
/quit                exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Commit(String),
    Edit(String),
    Play,
    Set(ParamId, f64),
    Status,
    Save,
    Load,
    Bounce(PathBuf),
    ListDevices,
    ListMidi,
    ConnectMidi(usize),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Commit(line.to_string()));
    };

    let (name, arg) = match rest.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "edit" => Ok(Command::Edit(arg.to_string())),
        "play" | "p" => Ok(Command::Play),
        "set" => {
            let (param, value) = arg
                .split_once(' ')
                .ok_or_else(|| "usage: /set <param> <value>".to_string())?;
            let id = ParamId::from_name(param.trim())
                .ok_or_else(|| format!("unknown parameter: {}", param.trim()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| format!("not a number: {}", value.trim()))?;
            Ok(Command::Set(id, value))
        }
        "status" => Ok(Command::Status),
        "save" => Ok(Command::Save),
        "load" => Ok(Command::Load),
        "bounce" if !arg.is_empty() => Ok(Command::Bounce(PathBuf::from(arg))),
        "bounce" => Err("usage: /bounce <path>".to_string()),
        "devices" => Ok(Command::ListDevices),
        "midi" if arg.is_empty() => Ok(Command::ListMidi),
        "midi" => arg
            .parse()
            .map(Command::ConnectMidi)
            .map_err(|_| format!("not a port index: {}", arg)),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: /{} (try /help)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_commits() {
        assert_eq!(parse_command("hello world\n"), Ok(Command::Commit("hello world".into())));
        assert_eq!(parse_command(""), Ok(Command::Commit(String::new())));
    }

    #[test]
    fn edit_keeps_inner_text() {
        assert_eq!(parse_command("/edit  two  words"), Ok(Command::Edit("two  words".into())));
    }

    #[test]
    fn set_parses_param_and_value() {
        assert_eq!(parse_command("/set pitch 90"), Ok(Command::Set(ParamId::Pitch, 90.0)));
        assert_eq!(parse_command("/set Gain 50.5"), Ok(Command::Set(ParamId::OutputGain, 50.5)));
        assert!(parse_command("/set pitch").is_err());
        assert!(parse_command("/set tone 3").is_err());
        assert!(parse_command("/set pitch loud").is_err());
    }

    #[test]
    fn midi_lists_or_connects() {
        assert_eq!(parse_command("/midi"), Ok(Command::ListMidi));
        assert_eq!(parse_command("/midi 2"), Ok(Command::ConnectMidi(2)));
        assert!(parse_command("/midi two").is_err());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_command("/play"), Ok(Command::Play));
        assert_eq!(parse_command("/status"), Ok(Command::Status));
        assert_eq!(parse_command("/save"), Ok(Command::Save));
        assert_eq!(parse_command("/load"), Ok(Command::Load));
        assert_eq!(parse_command("/quit"), Ok(Command::Quit));
        assert_eq!(parse_command("/devices"), Ok(Command::ListDevices));
        assert_eq!(parse_command("/bounce out.wav"), Ok(Command::Bounce("out.wav".into())));
        assert!(parse_command("/bounce").is_err());
        assert!(parse_command("/dance").is_err());
    }
}
