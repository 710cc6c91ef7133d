use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scoring::types::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Base directory for the `file` backend
    pub path: Option<PathBuf>,
    /// SeaORM connection string for the `database` backend
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            database_url: String::from("sqlite://vigil.sqlite3?mode=rwc"),
        }
    }
}

/// Per-category cooldown windows, in seconds. Fractional values are allowed.
///
/// `phone` and `notes` episodes share `object_cooldown_sec` but keep separate
/// clocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EpisodeConfig {
    #[serde(alias = "focus_cooldown_sec")]
    pub focus_cooldown_sec: f64,
    #[serde(alias = "multi_face_cooldown_sec")]
    pub multi_face_cooldown_sec: f64,
    #[serde(alias = "no_face_cooldown_sec")]
    pub no_face_cooldown_sec: f64,
    #[serde(alias = "object_cooldown_sec")]
    pub object_cooldown_sec: f64,
    #[serde(alias = "eyes_closed_cooldown_sec")]
    pub eyes_closed_cooldown_sec: f64,
    #[serde(alias = "drowsy_cooldown_sec")]
    pub drowsy_cooldown_sec: f64,
    #[serde(alias = "audio_cooldown_sec")]
    pub audio_cooldown_sec: f64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            focus_cooldown_sec: 20.0,
            multi_face_cooldown_sec: 20.0,
            no_face_cooldown_sec: 30.0,
            object_cooldown_sec: 10.0,
            eyes_closed_cooldown_sec: 15.0,
            drowsy_cooldown_sec: 20.0,
            audio_cooldown_sec: 20.0,
        }
    }
}

impl EpisodeConfig {
    /// Every cooldown with its `[episodes]` key.
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("focus_cooldown_sec", self.focus_cooldown_sec),
            ("multi_face_cooldown_sec", self.multi_face_cooldown_sec),
            ("no_face_cooldown_sec", self.no_face_cooldown_sec),
            ("object_cooldown_sec", self.object_cooldown_sec),
            ("eyes_closed_cooldown_sec", self.eyes_closed_cooldown_sec),
            ("drowsy_cooldown_sec", self.drowsy_cooldown_sec),
            ("audio_cooldown_sec", self.audio_cooldown_sec),
        ]
    }

    pub fn cooldown(&self, category: Category) -> Duration {
        let secs = match category {
            Category::FocusLoss => self.focus_cooldown_sec,
            Category::NoFace => self.no_face_cooldown_sec,
            Category::MultipleFaces => self.multi_face_cooldown_sec,
            Category::Phone | Category::Notes => self.object_cooldown_sec,
            Category::EyesClosed => self.eyes_closed_cooldown_sec,
            Category::Drowsiness => self.drowsy_cooldown_sec,
            Category::BackgroundVoices => self.audio_cooldown_sec,
        };
        // Out-of-range values saturate; `validate` rejects negative and non-finite ones.
        Duration::try_milliseconds((secs * 1000.0).round() as i64).unwrap_or(Duration::MAX)
    }
}

/// Flat deduction applied when a category has at least one episode.
///
/// Weights and caps are whole points, so the score stays an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringWeights {
    #[serde(alias = "focus_loss")]
    pub focus_loss: u32,
    #[serde(alias = "no_face")]
    pub no_face: u32,
    #[serde(alias = "multiple_faces")]
    pub multiple_faces: u32,
    pub phone: u32,
    pub notes: u32,
    #[serde(alias = "eyes_closed")]
    pub eyes_closed: u32,
    pub drowsiness: u32,
    #[serde(alias = "background_voices")]
    pub background_voices: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            focus_loss: 5,
            no_face: 10,
            multiple_faces: 10,
            phone: 15,
            notes: 10,
            eyes_closed: 8,
            drowsiness: 12,
            background_voices: 8,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::FocusLoss => self.focus_loss,
            Category::NoFace => self.no_face,
            Category::MultipleFaces => self.multiple_faces,
            Category::Phone => self.phone,
            Category::Notes => self.notes,
            Category::EyesClosed => self.eyes_closed,
            Category::Drowsiness => self.drowsiness,
            Category::BackgroundVoices => self.background_voices,
        }
    }
}

/// Upper bound on the deduction of each category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringCaps {
    #[serde(alias = "focus_loss")]
    pub focus_loss: u32,
    #[serde(alias = "no_face")]
    pub no_face: u32,
    #[serde(alias = "multiple_faces")]
    pub multiple_faces: u32,
    pub phone: u32,
    pub notes: u32,
    #[serde(alias = "eyes_closed")]
    pub eyes_closed: u32,
    pub drowsiness: u32,
    #[serde(alias = "background_voices")]
    pub background_voices: u32,
}

impl Default for ScoringCaps {
    fn default() -> Self {
        Self {
            focus_loss: 40,
            no_face: 50,
            multiple_faces: 50,
            phone: 60,
            notes: 40,
            eyes_closed: 30,
            drowsiness: 35,
            background_voices: 30,
        }
    }
}

impl ScoringCaps {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::FocusLoss => self.focus_loss,
            Category::NoFace => self.no_face,
            Category::MultipleFaces => self.multiple_faces,
            Category::Phone => self.phone,
            Category::Notes => self.notes,
            Category::EyesClosed => self.eyes_closed,
            Category::Drowsiness => self.drowsiness,
            Category::BackgroundVoices => self.background_voices,
        }
    }
}
