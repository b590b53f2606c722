//! Persistent resolution settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::anim::ClassifyOptions;
use crate::cache::Lod;
use crate::core::{SampleClock, TIME_BIAS};
use crate::util::Result;

/// Settings shared by the CLI and hosts embedding the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Sampling
    /// Tolerance for snapping a query time onto a stored sample.
    pub time_bias: f64,

    // Caching
    pub default_lod: Lod,
    pub include_ancestor_transform: bool,
    pub consider_visibility: bool,

    // Playback
    pub playback_fps: f64,

    // Recent scenes (most recent first, max 10)
    pub recent_files: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_bias: TIME_BIAS,
            default_lod: Lod::Full,
            include_ancestor_transform: true,
            consider_visibility: false,
            playback_fps: 24.0,
            recent_files: Vec::new(),
        }
    }
}

const MAX_RECENT_FILES: usize = 10;

impl Settings {
    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("alembic-timecache");
            p.push("settings.json");
            p
        })
    }

    /// Load from an explicit file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_default() -> Self {
        Self::default_path()
            .and_then(|p| Self::load(p).ok())
            .unwrap_or_default()
    }

    /// Save to an explicit file, creating its directory
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Save to the default location; silently skipped when there is none
    pub fn save_default(&self) -> Result<()> {
        match Self::default_path() {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    fn sanitize(&mut self) {
        if !self.time_bias.is_finite() {
            self.time_bias = TIME_BIAS;
        }
        if !(self.playback_fps.is_finite() && self.playback_fps > 0.0) {
            self.playback_fps = 24.0;
        }
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    pub fn clock(&self) -> SampleClock {
        SampleClock::new(self.time_bias)
    }

    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            include_ancestor_transform: self.include_ancestor_transform,
            consider_visibility: self.consider_visibility,
        }
    }

    /// Add file to recent files list (moves to top if already present)
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}
