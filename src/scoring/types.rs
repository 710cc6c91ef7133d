//! Behavioral categories and the per-category episode tally.

use serde::{Deserialize, Serialize};

/// The eight scored behavioral categories.
///
/// `Phone` and `Notes` are both derived from `object-detected` events but keep
/// independent episode clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FocusLoss,
    NoFace,
    MultipleFaces,
    Phone,
    Notes,
    EyesClosed,
    Drowsiness,
    BackgroundVoices,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::FocusLoss,
        Category::NoFace,
        Category::MultipleFaces,
        Category::Phone,
        Category::Notes,
        Category::EyesClosed,
        Category::Drowsiness,
        Category::BackgroundVoices,
    ];

    /// Raw event type that directly qualifies for this category, if any.
    ///
    /// Object categories return `None`: they qualify through label matching.
    pub fn direct_event_type(&self) -> Option<&'static str> {
        match self {
            Category::FocusLoss => Some(event_types::NOT_LOOKING),
            Category::NoFace => Some(event_types::NO_FACE),
            Category::MultipleFaces => Some(event_types::MULTIPLE_FACES),
            Category::EyesClosed => Some(event_types::EYES_CLOSED),
            Category::Drowsiness => Some(event_types::DROWSINESS),
            Category::BackgroundVoices => Some(event_types::BACKGROUND_VOICES),
            Category::Phone | Category::Notes => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Category::Phone | Category::Notes)
    }
}

/// Wire names of the detector event vocabulary.
pub mod event_types {
    pub const NOT_LOOKING: &str = "not-looking-5s";
    pub const NO_FACE: &str = "no-face-10s";
    pub const MULTIPLE_FACES: &str = "multiple-faces";
    pub const OBJECT_DETECTED: &str = "object-detected";
    pub const EYES_CLOSED: &str = "eyes-closed";
    pub const DROWSINESS: &str = "drowsiness-detected";
    pub const BACKGROUND_VOICES: &str = "background-voices";
}

/// Episode count per category, serialized with the report's `counts` keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounts {
    #[serde(rename = "focusLost")]
    pub focus_lost: u32,
    #[serde(rename = "multipleFaces")]
    pub multiple_faces: u32,
    #[serde(rename = "noFace")]
    pub no_face: u32,
    #[serde(rename = "phoneDetected")]
    pub phone_detected: u32,
    #[serde(rename = "notesDetected")]
    pub notes_detected: u32,
    #[serde(rename = "eyesClosed")]
    pub eyes_closed: u32,
    pub drowsiness: u32,
    #[serde(rename = "backgroundVoices")]
    pub background_voices: u32,
}

impl EpisodeCounts {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::FocusLoss => self.focus_lost,
            Category::NoFace => self.no_face,
            Category::MultipleFaces => self.multiple_faces,
            Category::Phone => self.phone_detected,
            Category::Notes => self.notes_detected,
            Category::EyesClosed => self.eyes_closed,
            Category::Drowsiness => self.drowsiness,
            Category::BackgroundVoices => self.background_voices,
        }
    }

    fn slot(&mut self, category: Category) -> &mut u32 {
        match category {
            Category::FocusLoss => &mut self.focus_lost,
            Category::NoFace => &mut self.no_face,
            Category::MultipleFaces => &mut self.multiple_faces,
            Category::Phone => &mut self.phone_detected,
            Category::Notes => &mut self.notes_detected,
            Category::EyesClosed => &mut self.eyes_closed,
            Category::Drowsiness => &mut self.drowsiness,
            Category::BackgroundVoices => &mut self.background_voices,
        }
    }

    pub fn increment(&mut self, category: Category) {
        *self.slot(category) += 1;
    }

    pub fn total(&self) -> u32 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}
