//! Synchronization points from one federate's point of view.
//!
//! The federate only tracks what it has been told: labels it is
//! registering, labels announced to it, and whether it has achieved each.
//! Quorum is the RTI's business.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use hla_proto::{ErrorKind, RtiError};
use tracing::debug;

/// Local view of one announced synchronization point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedPoint {
    /// Tag supplied by the registrant.
    pub tag: Bytes,
    /// `synchronizationPointAchieved` already sent.
    pub achieved: bool,
}

/// Outcome of validating `synchronizationPointAchieved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchieveOutcome {
    /// First achievement; forward to the RTI.
    Forward,
    /// Already achieved; nothing to send.
    AlreadyAchieved,
}

/// Synchronization point bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SyncPoints {
    registering: BTreeSet<String>,
    announced: BTreeMap<String, AnnouncedPoint>,
}

impl SyncPoints {
    /// Labels whose registration outcome has not arrived yet.
    pub fn registering(&self) -> impl Iterator<Item = &str> {
        self.registering.iter().map(String::as_str)
    }

    /// Announced point for `label`.
    pub fn announced(&self, label: &str) -> Option<&AnnouncedPoint> {
        self.announced.get(label)
    }

    /// Labels announced and not yet synchronized.
    pub fn pending_labels(&self) -> impl Iterator<Item = &str> {
        self.announced.keys().map(String::as_str)
    }

    /// Validate `synchronizationPointAchieved`.
    ///
    /// Achieving a label twice is allowed and never re-sent.
    pub fn check_achieve(&self, label: &str) -> Result<AchieveOutcome, RtiError> {
        match self.announced.get(label) {
            None => Err(RtiError::new(
                ErrorKind::SynchronizationPointLabelNotAnnounced,
                label.to_string(),
            )),
            Some(point) if point.achieved => Ok(AchieveOutcome::AlreadyAchieved),
            Some(_) => Ok(AchieveOutcome::Forward),
        }
    }

    /// Record a registration request sent to the RTI.
    pub fn registration_sent(&mut self, label: &str) {
        self.registering.insert(label.to_string());
    }

    /// `synchronizationPointRegistrationSucceeded` / `...Failed`.
    pub fn registration_resolved(&mut self, label: &str) {
        self.registering.remove(label);
    }

    /// `announceSynchronizationPoint`.
    pub fn announce(&mut self, label: &str, tag: Bytes) {
        debug!(label, "synchronization point announced");
        self.announced
            .entry(label.to_string())
            .or_insert(AnnouncedPoint { tag, achieved: false });
    }

    /// Record a forwarded `synchronizationPointAchieved`.
    pub fn achieved(&mut self, label: &str) {
        if let Some(point) = self.announced.get_mut(label) {
            point.achieved = true;
        }
    }

    /// `federationSynchronized`.
    ///
    /// # Errors
    ///
    /// `SynchronizationPointLabelNotAnnounced` if the label was never
    /// announced here.
    pub fn synchronized(&mut self, label: &str) -> Result<(), RtiError> {
        debug!(label, "federation synchronized");
        self.announced.remove(label).map(|_| ()).ok_or_else(|| {
            RtiError::new(ErrorKind::SynchronizationPointLabelNotAnnounced, label.to_string())
        })
    }
}
