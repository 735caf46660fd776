use std::path::Path;

use crate::agent_engine::fleet::AgentFleet;
use crate::config::{self, AppConfig};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    /// `None` targets every device.
    Start(Option<String>),
    Stop(Option<String>),
    Pause(Option<String>),
    Resume(Option<String>),
    Resize,
    Refresh(Option<String>),
    Status,
    Windows,
    Help,
    Quit,
}

pub const HELP: &str = "\
add <title>        bind an agent to the window with this exact title
remove <title>     stop and remove an agent, then re-tile the rest
start [title]      start one agent, or all
stop [title]       stop one agent, or all
pause [title]      pause one agent, or all
resume [title]     resume one agent, or all
resize             tile every window by its index
refresh [title]    send the reset gesture to one window, or all
status             print every agent's status as JSON
windows            list top-level window titles
quit               stop everything and exit";

/// Parse one input line. Titles are the rest of the line and may contain spaces.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let title = (!rest.is_empty()).then(|| rest.to_string());
    let required = |name: &str| title.clone().ok_or_else(|| format!("usage: {name} <title>"));

    match verb.to_ascii_lowercase().as_str() {
        "add" => Ok(Command::Add(required("add")?)),
        "remove" | "rm" => Ok(Command::Remove(required("remove")?)),
        "start" => Ok(Command::Start(title)),
        "stop" => Ok(Command::Stop(title)),
        "pause" => Ok(Command::Pause(title)),
        "resume" => Ok(Command::Resume(title)),
        "resize" => Ok(Command::Resize),
        "refresh" => Ok(Command::Refresh(title)),
        "status" => Ok(Command::Status),
        "windows" => Ok(Command::Windows),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command `{other}`; try `help`")),
    }
}

/// Apply `command` to the fleet and describe the outcome for display.
pub fn execute(fleet: &mut AgentFleet, command: Command) -> Result<String, String> {
    tracing::debug!(?command, "executing command");
    match command {
        Command::Add(title) => {
            fleet.add(&title).map_err(|e| e.to_string())?;
            Ok(format!("added {title} as device {}", fleet.len() - 1))
        }
        Command::Remove(title) => {
            if fleet.remove(&title) {
                Ok(format!("removed {title}"))
            } else {
                Ok(format!("{title} is not in the fleet"))
            }
        }
        Command::Start(None) => {
            fleet.start_all();
            Ok(format!("started {} device(s)", fleet.len()))
        }
        Command::Start(Some(title)) => {
            fleet.start(&title).map_err(|e| e.to_string())?;
            Ok(format!("started {title}"))
        }
        Command::Stop(None) => {
            fleet.stop_all();
            Ok(format!("stopped {} device(s)", fleet.len()))
        }
        Command::Stop(Some(title)) => {
            fleet.stop(&title).map_err(|e| e.to_string())?;
            Ok(format!("stopped {title}"))
        }
        Command::Pause(None) => {
            fleet.pause_all();
            Ok("paused all devices".to_string())
        }
        Command::Pause(Some(title)) => {
            fleet.pause(&title).map_err(|e| e.to_string())?;
            Ok(format!("paused {title}"))
        }
        Command::Resume(None) => {
            fleet.resume_all();
            Ok("resumed all devices".to_string())
        }
        Command::Resume(Some(title)) => {
            fleet.resume(&title).map_err(|e| e.to_string())?;
            Ok(format!("resumed {title}"))
        }
        Command::Resize => {
            fleet.resize_all();
            Ok(format!("tiled {} window(s)", fleet.len()))
        }
        Command::Refresh(None) => {
            fleet.refresh_all();
            Ok(format!("refreshed {} device(s)", fleet.len()))
        }
        Command::Refresh(Some(title)) => {
            fleet.refresh(&title).map_err(|e| e.to_string())?;
            Ok(format!("refreshed {title}"))
        }
        Command::Status => serde_json::to_string_pretty(&fleet.statuses()).map_err(|e| e.to_string()),
        Command::Windows => Ok(fleet.available_windows().join("\n")),
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok("bye".to_string()),
    }
}

/// Like `execute`, then write the device list to `config_path` when an add
/// or remove changed it, so the next start brings the same devices back.
pub fn execute_and_persist(
    fleet: &mut AgentFleet,
    config: &mut AppConfig,
    config_path: &Path,
    command: Command,
) -> Result<String, String> {
    let edits_devices = matches!(command, Command::Add(_) | Command::Remove(_));
    let out = execute(fleet, command)?;
    if edits_devices && config.devices != fleet.titles() {
        config.devices = fleet.titles();
        if let Err(e) = config::save_config(config_path, config) {
            tracing::warn!(error = %e, "failed to persist device list");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{empty_assets, services, FakeFrames, FakeWindows};
    use std::sync::Arc;

    #[test]
    fn titles_keep_inner_spaces() {
        assert_eq!(parse("add  LDPlayer 3 ").unwrap(), Command::Add("LDPlayer 3".into()));
        assert_eq!(parse("PAUSE Nox 1").unwrap(), Command::Pause(Some("Nox 1".into())));
    }

    #[test]
    fn optional_titles() {
        assert_eq!(parse("start").unwrap(), Command::Start(None));
        assert_eq!(parse("refresh").unwrap(), Command::Refresh(None));
        assert_eq!(parse("stop LD-1").unwrap(), Command::Stop(Some("LD-1".into())));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("add").unwrap_err().contains("usage"));
        assert!(parse("   ").is_err());
        assert!(parse("launch x").unwrap_err().contains("unknown"));
    }

    #[test]
    fn drives_the_fleet() {
        let assets = empty_assets();
        let windows = Arc::new(FakeWindows::with_titles(&["LD 0", "LD 1"]));
        let mut fleet = AgentFleet::new(services(windows.clone(), Arc::new(FakeFrames::blank()), assets.path()));

        assert_eq!(execute(&mut fleet, parse("add LD 0").unwrap()).unwrap(), "added LD 0 as device 0");
        assert!(execute(&mut fleet, parse("add LD 0").unwrap()).unwrap_err().contains("already"));
        assert!(execute(&mut fleet, parse("add LD 9").unwrap()).is_err());
        execute(&mut fleet, parse("add LD 1").unwrap()).unwrap();
        execute(&mut fleet, parse("pause LD 1").unwrap()).unwrap();

        let status = execute(&mut fleet, Command::Status).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(parsed[1]["title"], "LD 1");
        assert_eq!(parsed[1]["paused"], true);
        assert_eq!(parsed[0]["running"], false);

        assert_eq!(execute(&mut fleet, Command::Windows).unwrap(), "LD 0\nLD 1");
        assert_eq!(execute(&mut fleet, parse("remove LD 0").unwrap()).unwrap(), "removed LD 0");
        assert_eq!(fleet.titles(), vec!["LD 1"]);
    }

    fn saved_devices(path: &Path) -> Vec<String> {
        let text = std::fs::read_to_string(path).unwrap();
        toml::from_str::<AppConfig>(&text).unwrap().devices
    }

    #[test]
    fn device_edits_are_written_back() {
        let assets = empty_assets();
        let windows = Arc::new(FakeWindows::with_titles(&["LD 0", "LD 1"]));
        let mut fleet = AgentFleet::new(services(windows, Arc::new(FakeFrames::blank()), assets.path()));
        let mut config = AppConfig::default();
        let path = assets.path().join("config.toml");

        let mut run = |line: &str| execute_and_persist(&mut fleet, &mut config, &path, parse(line).unwrap());

        assert!(run("add LD 9").is_err());
        assert!(!path.exists());

        run("add LD 0").unwrap();
        run("add LD 1").unwrap();
        assert_eq!(saved_devices(&path), vec!["LD 0", "LD 1"]);

        run("remove LD 0").unwrap();
        assert_eq!(saved_devices(&path), vec!["LD 1"]);
    }

    #[test]
    fn other_commands_leave_the_file_alone() {
        let assets = empty_assets();
        let windows = Arc::new(FakeWindows::with_titles(&["LD 0"]));
        let mut fleet = AgentFleet::new(services(windows, Arc::new(FakeFrames::blank()), assets.path()));
        let mut config = AppConfig::default();
        let path = assets.path().join("config.toml");

        execute_and_persist(&mut fleet, &mut config, &path, Command::Status).unwrap();
        execute_and_persist(&mut fleet, &mut config, &path, parse("remove LD 0").unwrap()).unwrap();
        assert!(!path.exists());
    }
}
