/// Reference images for visual state detection, loaded from the asset store.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::AssetsConfig;
use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Pin,
    Green,
    Confirm,
    Glo,
    Glo2,
    StartPoint,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 6] = [
        TemplateKind::Pin,
        TemplateKind::Green,
        TemplateKind::Confirm,
        TemplateKind::Glo,
        TemplateKind::Glo2,
        TemplateKind::StartPoint,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TemplateKind::Pin => "pin",
            TemplateKind::Green => "green",
            TemplateKind::Confirm => "confirm",
            TemplateKind::Glo => "glo",
            TemplateKind::Glo2 => "glo2",
            TemplateKind::StartPoint => "start_point",
        }
    }
}

/// Stable identity of a loaded template: its category and load position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId {
    pub kind: TemplateKind,
    pub ordinal: usize,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub image: Arc<GrayImage>,
}

/// `*.png` files of a folder, sorted by file name.
pub fn png_files(folder: &Path) -> PilotResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .map_err(|e| PilotError::Config(format!("template folder {}: {e}", folder.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    files.sort();
    Ok(files)
}

/// Load one category's images as single-channel templates.
pub fn load_templates(folder: &Path, kind: TemplateKind) -> PilotResult<Vec<Template>> {
    let mut templates = Vec::new();
    for (ordinal, path) in png_files(folder)?.into_iter().enumerate() {
        let image = image::open(&path)?.to_luma8();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        templates.push(Template {
            id: TemplateId { kind, ordinal },
            name,
            image: Arc::new(image),
        });
    }
    if templates.is_empty() {
        tracing::warn!(folder = %folder.display(), kind = kind.label(), "no templates found");
    }
    Ok(templates)
}

/// Every category's templates, immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub pin: Vec<Template>,
    pub green: Vec<Template>,
    pub confirm: Vec<Template>,
    pub glo: Vec<Template>,
    pub glo2: Vec<Template>,
    pub start_point: Vec<Template>,
}

impl TemplateSet {
    pub fn load(assets: &AssetsConfig) -> PilotResult<Self> {
        let set = Self {
            pin: load_templates(&assets.folder(TemplateKind::Pin), TemplateKind::Pin)?,
            green: load_templates(&assets.folder(TemplateKind::Green), TemplateKind::Green)?,
            confirm: load_templates(&assets.folder(TemplateKind::Confirm), TemplateKind::Confirm)?,
            glo: load_templates(&assets.folder(TemplateKind::Glo), TemplateKind::Glo)?,
            glo2: load_templates(&assets.folder(TemplateKind::Glo2), TemplateKind::Glo2)?,
            start_point: load_templates(
                &assets.folder(TemplateKind::StartPoint),
                TemplateKind::StartPoint,
            )?,
        };
        tracing::debug!(
            pin = set.pin.len(),
            green = set.green.len(),
            confirm = set.confirm.len(),
            glo = set.glo.len(),
            glo2 = set.glo2.len(),
            start_point = set.start_point.len(),
            "templates loaded"
        );
        Ok(set)
    }

    pub fn get(&self, kind: TemplateKind) -> &[Template] {
        match kind {
            TemplateKind::Pin => &self.pin,
            TemplateKind::Green => &self.green,
            TemplateKind::Confirm => &self.confirm,
            TemplateKind::Glo => &self.glo,
            TemplateKind::Glo2 => &self.glo2,
            TemplateKind::StartPoint => &self.start_point,
        }
    }
}
