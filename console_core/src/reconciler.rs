//! Applies full-replacement entity snapshots to the rendered marker set.
//!
//! The subscription pushes complete snapshots, never deltas, so every
//! application creates markers for new ids, updates markers in place for
//! known ids and destroys markers whose id is absent from the snapshot.

use ahash::AHashMap;
use crowd_schema::EntityPayload;
use tracing::{debug, trace};

use crate::entity::{EntityCategory, TrackedEntity};
use crate::geo::LatLon;
use crate::style::MarkerStyle;

/// Render handle for one tracked entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMarker {
    pub position: LatLon,
    pub style: MarkerStyle,
    pub category: EntityCategory,
    epoch: u64,
}

/// Churn produced by the most recent application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub destroyed: usize,
}

impl ReconcileStats {
    pub fn churn(&self) -> usize {
        self.created + self.destroyed
    }
}

#[derive(Debug, Default)]
pub struct SnapshotReconciler {
    markers: AHashMap<String, EntityMarker>,
    epoch: u64,
    last_stats: ReconcileStats,
    applied: u64,
}

impl SnapshotReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rendered set with `snapshot`. When an id appears twice the
    /// last occurrence wins.
    pub fn apply(&mut self, snapshot: &[TrackedEntity]) {
        self.epoch = self.epoch.wrapping_add(1);
        let epoch = self.epoch;
        let mut stats = ReconcileStats::default();

        for entity in snapshot {
            let style = entity.marker_style();
            match self.markers.get_mut(entity.id.as_str()) {
                Some(marker) => {
                    let first_visit = marker.epoch != epoch;
                    marker.epoch = epoch;
                    if marker.position != entity.position
                        || marker.style != style
                        || marker.category != entity.category
                    {
                        marker.position = entity.position;
                        marker.style = style;
                        marker.category = entity.category.clone();
                        if first_visit {
                            stats.updated += 1;
                        }
                    } else if first_visit {
                        stats.unchanged += 1;
                    }
                }
                None => {
                    self.markers.insert(
                        entity.id.clone(),
                        EntityMarker {
                            position: entity.position,
                            style,
                            category: entity.category.clone(),
                            epoch,
                        },
                    );
                    stats.created += 1;
                }
            }
        }

        let before = self.markers.len();
        self.markers.retain(|_, marker| marker.epoch == epoch);
        stats.destroyed = before - self.markers.len();

        self.applied += 1;
        self.last_stats = stats;
        trace!(
            target: "crowd_console::reconciler",
            created = stats.created,
            updated = stats.updated,
            unchanged = stats.unchanged,
            destroyed = stats.destroyed,
            "snapshot.applied"
        );
    }

    pub fn apply_payloads(&mut self, payloads: &[EntityPayload]) {
        let entities: Vec<TrackedEntity> = payloads.iter().map(TrackedEntity::from_payload).collect();
        self.apply(&entities);
    }

    /// Destroys every marker ahead of the next snapshot.
    pub fn clear(&mut self) {
        self.remove_where(|_| true);
    }

    /// Destroys markers whose category label is `label` (e.g. `event`).
    pub fn clear_category(&mut self, label: &str) {
        self.remove_where(|marker| marker.category.label().eq_ignore_ascii_case(label));
    }

    fn remove_where(&mut self, doomed: impl Fn(&EntityMarker) -> bool) {
        let before = self.markers.len();
        self.markers.retain(|_, marker| !doomed(marker));
        let destroyed = before - self.markers.len();
        self.last_stats = ReconcileStats {
            destroyed,
            ..ReconcileStats::default()
        };
        debug!(
            target: "crowd_console::reconciler",
            destroyed,
            remaining = self.markers.len(),
            "entities.cleared"
        );
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn marker(&self, id: &str) -> Option<&EntityMarker> {
        self.markers.get(id)
    }

    pub fn markers(&self) -> impl Iterator<Item = (&str, &EntityMarker)> {
        self.markers.iter().map(|(id, marker)| (id.as_str(), marker))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.markers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn last_stats(&self) -> ReconcileStats {
        self.last_stats
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.applied
    }
}
