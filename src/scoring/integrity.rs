//! Integrity scoring from episode counts.

use serde::{Deserialize, Serialize};

use crate::configuration::types::{ScoringCaps, ScoringWeights};
use crate::scoring::types::{Category, EpisodeCounts};

/// Applied (post-cap) deduction per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deductions {
    pub focus_loss: u32,
    pub no_face: u32,
    pub multiple_faces: u32,
    pub phone: u32,
    pub notes: u32,
    pub eyes_closed: u32,
    pub drowsiness: u32,
    pub background_voices: u32,
}

impl Deductions {
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

    fn set(&mut self, category: Category, value: u32) {
        let slot = match category {
            Category::FocusLoss => &mut self.focus_loss,
            Category::NoFace => &mut self.no_face,
            Category::MultipleFaces => &mut self.multiple_faces,
            Category::Phone => &mut self.phone,
            Category::Notes => &mut self.notes,
            Category::EyesClosed => &mut self.eyes_closed,
            Category::Drowsiness => &mut self.drowsiness,
            Category::BackgroundVoices => &mut self.background_voices,
        };
        *slot = value;
    }

    pub fn total(&self) -> u32 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// The `integrity` block of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub score: u32,
    pub deductions: Deductions,
    pub weights: ScoringWeights,
    pub caps: ScoringCaps,
}

/// Scores episode counts.
///
/// A category with at least one episode costs its flat weight, clamped to its
/// cap; the count itself does not matter beyond being non-zero. The score is
/// `100 - total`, floored at zero.
pub fn score(counts: &EpisodeCounts, weights: &ScoringWeights, caps: &ScoringCaps) -> Integrity {
    let mut deductions = Deductions::default();
    for category in Category::ALL {
        let raw = if counts.get(category) > 0 {
            weights.get(category)
        } else {
            0
        };
        deductions.set(category, raw.min(caps.get(category)));
    }
    Integrity {
        score: 100u32.saturating_sub(deductions.total()),
        deductions,
        weights: weights.clone(),
        caps: caps.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts_with(categories: &[(Category, u32)]) -> EpisodeCounts {
        let mut counts = EpisodeCounts::default();
        for (category, n) in categories {
            for _ in 0..*n {
                counts.increment(*category);
            }
        }
        counts
    }

    #[test]
    fn deduction_is_flat_not_proportional() {
        let weights = ScoringWeights::default();
        let caps = ScoringCaps::default();
        let once = score(&counts_with(&[(Category::NoFace, 1)]), &weights, &caps);
        let many = score(&counts_with(&[(Category::NoFace, 7)]), &weights, &caps);
        assert_eq!(once.deductions.no_face, 10);
        assert_eq!(once, many);
        assert_eq!(once.score, 90);
    }

    #[test]
    fn cap_clamps_weight() {
        let weights = ScoringWeights {
            phone: 80,
            ..Default::default()
        };
        let caps = ScoringCaps::default();
        let integrity = score(&counts_with(&[(Category::Phone, 1)]), &weights, &caps);
        assert_eq!(integrity.deductions.phone, 60);
        assert_eq!(integrity.score, 40);
    }

    #[test]
    fn score_floors_at_zero() {
        let weights = ScoringWeights {
            focus_loss: 40,
            no_face: 50,
            multiple_faces: 50,
            ..Default::default()
        };
        let caps = ScoringCaps::default();
        let counts = counts_with(&[
            (Category::FocusLoss, 1),
            (Category::NoFace, 1),
            (Category::MultipleFaces, 1),
        ]);
        assert_eq!(score(&counts, &weights, &caps).score, 0);
    }

    #[test]
    fn adding_an_episode_never_raises_the_score() {
        let weights = ScoringWeights::default();
        let caps = ScoringCaps::default();
        let mut counts = EpisodeCounts::default();
        let mut previous = score(&counts, &weights, &caps).score;
        assert_eq!(previous, 100);
        for category in Category::ALL.into_iter().chain(Category::ALL) {
            counts.increment(category);
            let next = score(&counts, &weights, &caps).score;
            assert!(next <= previous, "{:?} raised the score", category);
            previous = next;
        }
        // Every default weight applied once: 100 - 78.
        assert_eq!(previous, 22);
    }

    #[test]
    fn deductions_serialize_in_fixed_order() {
        let integrity = score(
            &counts_with(&[(Category::Notes, 1)]),
            &ScoringWeights::default(),
            &ScoringCaps::default(),
        );
        let json = serde_json::to_string(&integrity.deductions).unwrap();
        assert_eq!(
            json,
            r#"{"focusLoss":0,"noFace":0,"multipleFaces":0,"phone":0,"notes":10,"eyesClosed":0,"drowsiness":0,"backgroundVoices":0}"#
        );
    }
}
