pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod perception;
pub mod platform;

#[cfg(test)]
mod testing;

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use crate::agent_engine::device::Services;
use crate::agent_engine::fleet::AgentFleet;
use crate::commands::Command;
use crate::config::AppConfig;
use crate::perception::capture::XcapFrameSource;
use crate::perception::traits::SharedDetector;
use crate::perception::yolo_detector::YoloDetector;

fn build_services(config: AppConfig) -> Services {
    let detector = YoloDetector::try_new(&config.detector).map(|d| Arc::new(Mutex::new(d)) as SharedDetector);
    Services {
        windows: platform::create_window_system(),
        frames: Arc::new(XcapFrameSource),
        detector,
        config: Arc::new(config),
    }
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config; using built-in defaults");
            AppConfig::default()
        }
    };
    let mut saved = config.clone();
    let config_path = config::config_path();

    let mut fleet = AgentFleet::new(build_services(config));
    for title in &saved.devices {
        if let Err(e) = fleet.add(title) {
            tracing::error!(title = %title, error = %e, "Failed to add configured device");
        }
    }
    if !fleet.is_empty() {
        fleet.resize_all();
    }
    if saved.autostart {
        fleet.start_all();
    }

    tracing::info!(devices = fleet.len(), "console ready; type `help` for commands");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match commands::parse(&line) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };
        let quit = command == Command::Quit;
        match commands::execute_and_persist(&mut fleet, &mut saved, &config_path, command) {
            Ok(out) => println!("{out}"),
            Err(msg) => eprintln!("{msg}"),
        }
        let _ = io::stdout().flush();
        if quit {
            break;
        }
    }

    fleet.stop_all();
    tracing::info!("PixelPilot exited");
}
