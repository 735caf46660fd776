use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;
use crate::perception::templates::TemplateKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Window titles added to the fleet at startup, in tile order.
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Reference image folders, one per template category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    #[serde(default = "default_pin_dir")]
    pub pin: String,
    #[serde(default = "default_glo_dir")]
    pub glo: String,
    #[serde(default = "default_glo2_dir")]
    pub glo2: String,
    #[serde(default = "default_green_dir")]
    pub green: String,
    #[serde(default = "default_confirm_dir")]
    pub confirm: String,
    #[serde(default = "default_start_points_dir")]
    pub start_points: String,
}

impl AssetsConfig {
    pub fn folder(&self, kind: TemplateKind) -> PathBuf {
        let sub = match kind {
            TemplateKind::Pin => &self.pin,
            TemplateKind::Glo => &self.glo,
            TemplateKind::Glo2 => &self.glo2,
            TemplateKind::Green => &self.green,
            TemplateKind::Confirm => &self.confirm,
            TemplateKind::StartPoint => &self.start_points,
        };
        self.root.join(sub)
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            pin: default_pin_dir(),
            glo: default_glo_dir(),
            glo2: default_glo2_dir(),
            green: default_green_dir(),
            confirm: default_confirm_dir(),
            start_points: default_start_points_dir(),
        }
    }
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("img")
}
fn default_pin_dir() -> String {
    "pin".into()
}
fn default_glo_dir() -> String {
    "glo".into()
}
fn default_glo2_dir() -> String {
    "glo2".into()
}
fn default_green_dir() -> String {
    "green".into()
}
fn default_confirm_dir() -> String {
    "confirm".into()
}
fn default_start_points_dir() -> String {
    "start_points".into()
}

/// Output tensor layout of the exported YOLO model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YoloLayout {
    /// `[1, proposals, 5 + classes]` with an objectness column.
    V5,
    /// `[1, 4 + classes, proposals]` with class scores only.
    V8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Captcha targets must score strictly above this.
    #[serde(default = "default_threshold")]
    pub target_confidence: f32,
    #[serde(default = "default_iou")]
    pub iou_threshold: f32,
    #[serde(default = "default_layout")]
    pub layout: YoloLayout,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_size: default_input_size(),
            target_confidence: default_threshold(),
            iou_threshold: default_iou(),
            layout: default_layout(),
        }
    }
}

fn default_model_path() -> String {
    "models/best.onnx".into()
}
fn default_input_size() -> u32 {
    640
}
fn default_threshold() -> f32 {
    0.8
}
fn default_iou() -> f32 {
    0.45
}
fn default_layout() -> YoloLayout {
    YoloLayout::V5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Tried in order for every template; the first passing scale wins.
    #[serde(default = "default_scales")]
    pub scales: Vec<f32>,
    #[serde(default = "default_threshold")]
    pub anchor_threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            scales: default_scales(),
            anchor_threshold: default_threshold(),
        }
    }
}

fn default_scales() -> Vec<f32> {
    vec![0.95, 1.0, 1.05]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_cell_width")]
    pub cell_width: i32,
    #[serde(default = "default_cell_height")]
    pub cell_height: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
        }
    }
}

fn default_columns() -> u32 {
    6
}
fn default_cell_width() -> i32 {
    215
}
fn default_cell_height() -> i32 {
    515
}

/// A point in window client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Fixed click coordinates of the automated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default = "default_green_target")]
    pub green: Point,
    #[serde(default = "default_glo_target")]
    pub glo: Point,
    #[serde(default = "default_glo2_target")]
    pub glo2: Point,
    #[serde(default = "default_confirm_target")]
    pub confirm: Point,
    #[serde(default = "default_pin_first")]
    pub pin_first: Point,
    #[serde(default = "default_pin_digit")]
    pub pin_digit: Point,
    #[serde(default = "default_refresh_first")]
    pub refresh_first: Point,
    #[serde(default = "default_refresh_second")]
    pub refresh_second: Point,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            green: default_green_target(),
            glo: default_glo_target(),
            glo2: default_glo2_target(),
            confirm: default_confirm_target(),
            pin_first: default_pin_first(),
            pin_digit: default_pin_digit(),
            refresh_first: default_refresh_first(),
            refresh_second: default_refresh_second(),
        }
    }
}

fn default_green_target() -> Point {
    Point::new(173, 133)
}
fn default_glo_target() -> Point {
    Point::new(148, 467)
}
fn default_glo2_target() -> Point {
    Point::new(29, 139)
}
fn default_confirm_target() -> Point {
    Point::new(48, 466)
}
fn default_pin_first() -> Point {
    Point::new(107, 420)
}
fn default_pin_digit() -> Point {
    Point::new(169, 415)
}
fn default_refresh_first() -> Point {
    Point::new(107, 450)
}
fn default_refresh_second() -> Point {
    Point::new(36, 450)
}

/// Delays and debounce intervals, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_green_debounce_ms")]
    pub green_debounce_ms: u64,
    #[serde(default = "default_confirm_debounce_ms")]
    pub confirm_debounce_ms: u64,
    #[serde(default = "default_pin_debounce_ms")]
    pub pin_debounce_ms: u64,
    #[serde(default = "default_glo_delay_ms")]
    pub glo_delay_ms: u64,
    #[serde(default = "default_glo2_delay_ms")]
    pub glo2_delay_ms: u64,
    #[serde(default = "default_pin_lead_in_ms")]
    pub pin_lead_in_ms: [u64; 2],
    #[serde(default = "default_pin_digit_gap_ms")]
    pub pin_digit_gap_ms: u64,
    #[serde(default = "default_pin_digit_count")]
    pub pin_digit_count: u32,
    #[serde(default = "default_captcha_settle_ms")]
    pub captcha_settle_ms: u64,
    #[serde(default = "default_drag_nominal_ms")]
    pub drag_nominal_ms: u64,
    #[serde(default = "default_drag_cap_ms")]
    pub drag_cap_ms: u64,
    #[serde(default = "default_drag_pixels_per_sec")]
    pub drag_pixels_per_sec: f64,
    #[serde(default = "default_drag_steps")]
    pub drag_steps: u32,
    #[serde(default = "default_foreground_settle_ms")]
    pub foreground_settle_ms: u64,
    #[serde(default = "default_release_settle_ms")]
    pub release_settle_ms: u64,
    #[serde(default = "default_refresh_gap_ms")]
    pub refresh_gap_ms: u64,
    #[serde(default = "default_refresh_resume_ms")]
    pub refresh_resume_ms: u64,
}

impl TimingConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// Every delay set to zero; debounce intervals kept.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            poll_ms: 1,
            glo_delay_ms: 0,
            glo2_delay_ms: 0,
            pin_lead_in_ms: [0, 0],
            pin_digit_gap_ms: 0,
            captcha_settle_ms: 0,
            foreground_settle_ms: 0,
            release_settle_ms: 0,
            refresh_gap_ms: 0,
            refresh_resume_ms: 0,
            drag_nominal_ms: 0,
            drag_cap_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            green_debounce_ms: default_green_debounce_ms(),
            confirm_debounce_ms: default_confirm_debounce_ms(),
            pin_debounce_ms: default_pin_debounce_ms(),
            glo_delay_ms: default_glo_delay_ms(),
            glo2_delay_ms: default_glo2_delay_ms(),
            pin_lead_in_ms: default_pin_lead_in_ms(),
            pin_digit_gap_ms: default_pin_digit_gap_ms(),
            pin_digit_count: default_pin_digit_count(),
            captcha_settle_ms: default_captcha_settle_ms(),
            drag_nominal_ms: default_drag_nominal_ms(),
            drag_cap_ms: default_drag_cap_ms(),
            drag_pixels_per_sec: default_drag_pixels_per_sec(),
            drag_steps: default_drag_steps(),
            foreground_settle_ms: default_foreground_settle_ms(),
            release_settle_ms: default_release_settle_ms(),
            refresh_gap_ms: default_refresh_gap_ms(),
            refresh_resume_ms: default_refresh_resume_ms(),
        }
    }
}

fn default_poll_ms() -> u64 {
    100
}
fn default_green_debounce_ms() -> u64 {
    5000
}
fn default_confirm_debounce_ms() -> u64 {
    250
}
fn default_pin_debounce_ms() -> u64 {
    1000
}
fn default_glo_delay_ms() -> u64 {
    1000
}
fn default_glo2_delay_ms() -> u64 {
    500
}
fn default_pin_lead_in_ms() -> [u64; 2] {
    [20, 50]
}
fn default_pin_digit_gap_ms() -> u64 {
    40
}
fn default_pin_digit_count() -> u32 {
    5
}
fn default_captcha_settle_ms() -> u64 {
    300
}
fn default_drag_nominal_ms() -> u64 {
    100
}
fn default_drag_cap_ms() -> u64 {
    200
}
fn default_drag_pixels_per_sec() -> f64 {
    200.0
}
fn default_drag_steps() -> u32 {
    10
}
fn default_foreground_settle_ms() -> u64 {
    50
}
fn default_release_settle_ms() -> u64 {
    50
}
fn default_refresh_gap_ms() -> u64 {
    500
}
fn default_refresh_resume_ms() -> u64 {
    100
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = dirs::config_dir()?.join("pixelpilot").join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in user config dir");
        return Some(candidate);
    }
    None
}

/// Load `config.toml`; a missing file yields the built-in defaults.
pub fn load_config() -> PilotResult<AppConfig> {
    let Some(path) = resolve_config_path() else {
        tracing::warn!("config.toml not found; using built-in defaults");
        return Ok(AppConfig::default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), devices = config.devices.len(), "config loaded");
    Ok(config)
}

/// Where `config.toml` is read from, or would be created in the working directory.
pub fn config_path() -> PathBuf {
    resolve_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
}

pub fn save_config(path: &Path, config: &AppConfig) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), devices = config.devices.len(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_workflow_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.matching.scales, vec![0.95, 1.0, 1.05]);
        assert_eq!(cfg.layout.columns, 6);
        assert_eq!(cfg.targets.confirm, Point::new(48, 466));
        assert_eq!(cfg.timing.pin_digit_count, 5);
        assert_eq!(cfg.detector.layout, YoloLayout::V5);
        assert!(!cfg.autostart);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"
            devices = ["LDPlayer-1", "LDPlayer-2"]
            autostart = true

            [timing]
            poll_ms = 50

            [targets]
            green = { x = 10, y = 20 }

            [detector]
            layout = "v8"
        "#;
        let cfg: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.devices, vec!["LDPlayer-1", "LDPlayer-2"]);
        assert!(cfg.autostart);
        assert_eq!(cfg.timing.poll(), Duration::from_millis(50));
        assert_eq!(cfg.timing.confirm_debounce_ms, 250);
        assert_eq!(cfg.targets.green, Point::new(10, 20));
        assert_eq!(cfg.targets.glo2, Point::new(29, 139));
        assert_eq!(cfg.detector.layout, YoloLayout::V8);
    }

    #[test]
    fn asset_folders_join_root() {
        let assets = AssetsConfig::default();
        assert_eq!(
            assets.folder(TemplateKind::StartPoint),
            PathBuf::from("img").join("start_points")
        );
        assert_eq!(assets.folder(TemplateKind::Glo2), PathBuf::from("img").join("glo2"));
    }

    #[test]
    fn saved_devices_load_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.devices = vec!["LD-2".into(), "LD-0".into()];
        cfg.timing.poll_ms = 80;

        save_config(&path, &cfg).unwrap();
        let back: AppConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.devices, vec!["LD-2", "LD-0"]);
        assert_eq!(back.timing.poll_ms, 80);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.timing.drag_cap_ms, cfg.timing.drag_cap_ms);
        assert_eq!(back.assets.root, cfg.assets.root);
    }
}
