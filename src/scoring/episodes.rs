//! Cooldown-based episode collapsing.
//!
//! Each category keeps the time of its last accepted episode start. An event
//! opens a new episode only when it lies strictly more than the category's
//! cooldown after that start; anything closer is absorbed. This is a debounce,
//! not a sliding window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::trace;

use crate::configuration::types::EpisodeConfig;
use crate::scoring::labels::{is_notes_label, is_phone_label, object_labels};
use crate::scoring::types::{event_types, Category, EpisodeCounts};
use crate::storage::types::RawEvent;

/// Categories a single raw event qualifies for.
///
/// An `object-detected` event can count for both `Phone` and `Notes`.
pub fn qualifying_categories(event: &RawEvent) -> Vec<Category> {
    if event.event_type == event_types::OBJECT_DETECTED {
        let labels = object_labels(event);
        let mut categories = Vec::with_capacity(2);
        if labels.iter().any(|l| is_phone_label(l)) {
            categories.push(Category::Phone);
        }
        if labels.iter().any(|l| is_notes_label(l)) {
            categories.push(Category::Notes);
        }
        return categories;
    }
    Category::ALL
        .into_iter()
        .filter(|c| c.direct_event_type() == Some(event.event_type.as_str()))
        .collect()
}

/// Counts episodes per category in `events`.
///
/// Input order does not matter: events are stably sorted by time first.
pub fn collapse_episodes(events: &[RawEvent], config: &EpisodeConfig) -> EpisodeCounts {
    let mut ordered: Vec<&RawEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.time);

    let mut counts = EpisodeCounts::default();
    let mut last_start: HashMap<Category, DateTime<Utc>> = HashMap::new();

    for event in ordered {
        for category in qualifying_categories(event) {
            let opens_episode = match last_start.get(&category) {
                None => true,
                Some(last) => event.time - *last > config.cooldown(category),
            };
            if opens_episode {
                trace!(
                    "[{}] {:?} episode starts at {}",
                    event.session_id,
                    category,
                    event.time
                );
                counts.increment(category);
                last_start.insert(category, event.time);
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ev(kind: &str, secs: i64) -> RawEvent {
        RawEvent::new("S", kind, at(secs))
    }

    #[test]
    fn cooldown_boundary_is_strict() {
        let config = EpisodeConfig::default();
        let c = config.focus_cooldown_sec as i64;

        let after = collapse_episodes(&[ev("not-looking-5s", 0), ev("not-looking-5s", c + 1)], &config);
        assert_eq!(after.focus_lost, 2);

        let exactly = collapse_episodes(&[ev("not-looking-5s", 0), ev("not-looking-5s", c)], &config);
        assert_eq!(exactly.focus_lost, 1);

        let before = collapse_episodes(&[ev("not-looking-5s", 0), ev("not-looking-5s", c - 1)], &config);
        assert_eq!(before.focus_lost, 1);
    }

    #[test]
    fn only_the_episode_start_gates_the_next() {
        let config = EpisodeConfig::default();
        // 30s cooldown: 0 opens, 20 is absorbed, 40 opens, 60 is absorbed.
        let events = [
            ev("no-face-10s", 0),
            ev("no-face-10s", 20),
            ev("no-face-10s", 40),
            ev("no-face-10s", 60),
        ];
        assert_eq!(collapse_episodes(&events, &config).no_face, 2);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let config = EpisodeConfig::default();
        let events = [ev("eyes-closed", 100), ev("eyes-closed", 0), ev("eyes-closed", 10)];
        assert_eq!(collapse_episodes(&events, &config).eyes_closed, 2);
    }

    #[test]
    fn phone_and_notes_keep_independent_clocks() {
        let config = EpisodeConfig::default();
        let events = [
            ev("object-detected", 0).with_details("cell phone 90%"),
            ev("object-detected", 5).with_details("book 70%, cell phone 88%"),
            ev("object-detected", 12).with_objects(vec![String::from("notebook")]),
            ev("object-detected", 16).with_details("phone"),
        ];
        let counts = collapse_episodes(&events, &config);
        // phone: 0 opens, 5 absorbed, 16 opens; notes: 5 opens, 12 absorbed.
        assert_eq!(counts.phone_detected, 2);
        assert_eq!(counts.notes_detected, 1);
    }

    #[test]
    fn operational_events_are_ignored() {
        let config = EpisodeConfig::default();
        let events = [
            ev("session-start", 0),
            ev("object-detected", 1).with_details("laptop 99%"),
            ev("drowsiness-detected", 2),
            ev("background-voices", 3),
            ev("multiple-faces", 4),
        ];
        let counts = collapse_episodes(&events, &config);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.drowsiness, 1);
        assert_eq!(counts.background_voices, 1);
        assert_eq!(counts.multiple_faces, 1);
    }

    #[test]
    fn qualifying_categories_for_mixed_objects() {
        let both = ev("object-detected", 0).with_details("smartphone 55%, paper");
        assert_eq!(
            qualifying_categories(&both),
            vec![Category::Phone, Category::Notes]
        );
        assert_eq!(
            qualifying_categories(&ev("no-face-10s", 0)),
            vec![Category::NoFace]
        );
    }
}
