//! Config module.
//! Manages I/O for settings.json (hotkeys, color search area, replay timing).
//! Uses serde for JSON serialization.
//! Auto-generates defaults when the file is missing.
//! CLI flags override individual fields for a single run without touching the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{MacroError, MacroResult};
use crate::keys::KeyCode;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Width of the color search area stored with color-armed clicks
    pub color_area_width: u32,
    /// Height of the color search area stored with color-armed clicks
    pub color_area_height: u32,
    /// Arms color capture for the next recorded click
    pub color_toggle_key: KeyCode,
    /// Ends a recording session
    pub stop_recording_key: KeyCode,

    pub pause_key: KeyCode,
    pub stop_key: KeyCode,
    /// Cuts the current wait short
    pub skip_key: KeyCode,

    /// Multiplier on every recorded delay (0.5 = twice as fast)
    pub time_scale: f64,
    pub loop_until_stopped: bool,
    /// Playback waits for the pause key before the first action
    pub start_paused: bool,
    /// Restarts of a script iteration after a failed color match before aborting
    pub max_retries: u32,
    /// Matching blobs smaller than this many pixels are ignored
    pub min_cluster_size: usize,
    pub granular_sleep_ms: u64,
    /// Pause between iterations of the same script
    pub iteration_gap_ms: u64,
    /// Pause between pointer move and click, and between key press and release
    pub action_settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color_area_width: 300,
            color_area_height: 500,
            color_toggle_key: KeyCode::Shift,
            stop_recording_key: KeyCode::Tab,
            pause_key: KeyCode::Space,
            stop_key: KeyCode::Char('s'),
            skip_key: KeyCode::Char('n'),
            time_scale: 1.0,
            loop_until_stopped: false,
            start_paused: false,
            max_retries: 3,
            min_cluster_size: 1,
            granular_sleep_ms: 30,
            iteration_gap_ms: 200,
            action_settle_ms: 60,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, writing defaults there first if the file does not exist.
    pub fn load_or_create(path: &Path) -> MacroResult<Self> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save(path)?;
            tracing::info!(path = %path.display(), "created default settings");
            return Ok(settings);
        }
        let raw = fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| MacroError::json(path, e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> MacroResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MacroError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| MacroError::json(path, e))?;
        fs::write(path, json).map_err(|e| MacroError::io(path, e))
    }

    pub fn validate(&self) -> MacroResult<()> {
        if self.color_area_width == 0 || self.color_area_height == 0 {
            return Err(MacroError::config(format!(
                "color area must be non-empty, got {}x{}",
                self.color_area_width, self.color_area_height
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(MacroError::config(format!(
                "time_scale must be a non-negative number, got {}",
                self.time_scale
            )));
        }
        if self.granular_sleep_ms == 0 {
            return Err(MacroError::config("granular_sleep_ms must be > 0"));
        }
        if self.min_cluster_size == 0 {
            return Err(MacroError::config("min_cluster_size must be >= 1"));
        }
        let replay_keys = [self.pause_key, self.stop_key, self.skip_key];
        for (i, a) in replay_keys.iter().enumerate() {
            if replay_keys[i + 1..].iter().any(|b| a.matches(b)) {
                return Err(MacroError::config(format!(
                    "replay hotkey '{}' is bound more than once",
                    a
                )));
            }
        }
        if self.color_toggle_key.matches(&self.stop_recording_key) {
            return Err(MacroError::config(
                "color toggle key and stop recording key must differ",
            ));
        }
        Ok(())
    }

    /// Updates one field from its string form, e.g. `set("pause_key", "f9")`.
    pub fn set(&mut self, key: &str, value: &str) -> MacroResult<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> MacroResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| MacroError::config(format!("invalid value '{}' for {}", value, key)))
        }

        let mut updated = self.clone();
        match key {
            "color_area_width" => updated.color_area_width = parse(key, value)?,
            "color_area_height" => updated.color_area_height = parse(key, value)?,
            "color_toggle_key" => updated.color_toggle_key = parse(key, value)?,
            "stop_recording_key" => updated.stop_recording_key = parse(key, value)?,
            "pause_key" => updated.pause_key = parse(key, value)?,
            "stop_key" => updated.stop_key = parse(key, value)?,
            "skip_key" => updated.skip_key = parse(key, value)?,
            "time_scale" => updated.time_scale = parse(key, value)?,
            "loop_until_stopped" => updated.loop_until_stopped = parse(key, value)?,
            "start_paused" => updated.start_paused = parse(key, value)?,
            "max_retries" => updated.max_retries = parse(key, value)?,
            "min_cluster_size" => updated.min_cluster_size = parse(key, value)?,
            "granular_sleep_ms" => updated.granular_sleep_ms = parse(key, value)?,
            "iteration_gap_ms" => updated.iteration_gap_ms = parse(key, value)?,
            "action_settle_ms" => updated.action_settle_ms = parse(key, value)?,
            other => return Err(MacroError::config(format!("unknown setting '{}'", other))),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn action_settle(&self) -> Duration {
        Duration::from_millis(self.action_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.color_area_width, 300);
        assert_eq!(settings.color_area_height, 500);
        assert_eq!(settings.pause_key, KeyCode::Space);
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"time_scale": 0.5, "stop_key": "q"}"#).unwrap();
        let settings = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings.time_scale, 0.5);
        assert_eq!(settings.stop_key, KeyCode::Char('q'));
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_set_updates_and_validates() {
        let mut settings = Settings::default();
        settings.set("pause_key", "f9").unwrap();
        assert_eq!(settings.pause_key, KeyCode::F(9));
        settings.set("time_scale", "0.25").unwrap();
        assert_eq!(settings.time_scale, 0.25);

        assert!(settings.set("time_scale", "-1").is_err());
        assert!(settings.set("no_such_key", "1").is_err());
        // stop key colliding with skip key is rejected and leaves settings untouched
        assert!(settings.set("stop_key", "n").is_err());
        assert_eq!(settings.stop_key, KeyCode::Char('s'));
    }

    #[test]
    fn test_save_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let mut settings = Settings::default();
        settings.loop_until_stopped = true;
        settings.save(&path).unwrap();
        let loaded = Settings::load_or_create(&path).unwrap();
        assert!(loaded.loop_until_stopped);
    }
}
