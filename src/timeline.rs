//! Operator event markers on the acquisition timeline.
//!
//! Markers annotate the recording ("Stressor Start", "Recovery", ...) at the
//! timestamp the operator pressed the button. They are kept in insertion
//! order, independent of the sample buffers: a marker whose timestamp scrolls
//! off the visible window is still listed and still exported.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::TimelineError;

/// Stable handle for one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(Uuid);

impl MarkerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MarkerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One timestamped annotation. Immutable once created; deleted explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub label: String,
    pub timestamp: f64,
    /// Opaque display tag, "#RRGGBB".
    pub color: String,
}

/// Insertion-ordered, mutable collection of markers.
#[derive(Debug, Default)]
pub struct EventTimeline {
    markers: Vec<Marker>,
}

impl EventTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a marker at the given timestamp and return its handle.
    pub fn insert_at(
        &mut self,
        timestamp: f64,
        label: impl Into<String>,
        color: impl Into<String>,
    ) -> MarkerId {
        let id = MarkerId::new();
        self.markers.push(Marker {
            id,
            label: label.into(),
            timestamp,
            color: color.into(),
        });
        id
    }

    /// Delete a marker by handle, returning it. A missing handle is reported
    /// as [`TimelineError::MarkerNotFound`].
    pub fn remove(&mut self, id: MarkerId) -> Result<Marker, TimelineError> {
        match self.markers.iter().position(|m| m.id == id) {
            Some(idx) => Ok(self.markers.remove(idx)),
            None => Err(TimelineError::MarkerNotFound(id)),
        }
    }

    /// Markers in insertion order.
    pub fn list(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Random "#RRGGBB" display tag for a new marker.
pub fn random_color_tag() -> String {
    format!("#{:06X}", fastrand::u32(0..0x1_00_00_00))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_list_round_trip() {
        let mut timeline = EventTimeline::new();
        let id = timeline.insert_at(2.5, "Stressor Start", "#FF0000");

        let markers = timeline.list();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, id);
        assert_eq!(markers[0].label, "Stressor Start");
        assert_eq!(markers[0].timestamp, 2.5);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut timeline = EventTimeline::new();
        timeline.insert_at(1.0, "a", "#111111");
        timeline.insert_at(3.0, "b", "#222222");
        timeline.insert_at(2.0, "c", "#333333");

        let labels: Vec<&str> = timeline.list().iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
    }

    #[test]
    fn remove_deletes_exactly_one_and_signals_not_found_after() {
        let mut timeline = EventTimeline::new();
        let keep = timeline.insert_at(1.0, "keep", "#111111");
        let drop = timeline.insert_at(2.0, "drop", "#222222");

        let removed = timeline.remove(drop).unwrap();
        assert_eq!(removed.label, "drop");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.list()[0].id, keep);

        // double remove signals NotFound, state unchanged
        assert_eq!(
            timeline.remove(drop).unwrap_err(),
            TimelineError::MarkerNotFound(drop)
        );
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn marker_id_round_trips_through_display() {
        let mut timeline = EventTimeline::new();
        let id = timeline.insert_at(0.0, "x", "#000000");
        let parsed: MarkerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn color_tags_are_well_formed() {
        for _ in 0..32 {
            let tag = random_color_tag();
            assert_eq!(tag.len(), 7);
            assert!(tag.starts_with('#'));
            assert!(tag[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
