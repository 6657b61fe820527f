//! Federation synchronization points.

use std::collections::BTreeMap;

use bytes::Bytes;
use hla_proto::{
    Callback, ErrorKind, FederateHandle, FederateHandleSet, LogicalTime, RtiError, SyncPointFailureReason,
};
use tracing::{debug, info};

use super::Federation;

#[derive(Debug, Clone)]
pub(super) struct SyncPoint {
    tag: Bytes,
    /// Registered without an explicit set: late joiners become members.
    whole_federation: bool,
    /// Members and, once achieved, whether they succeeded.
    members: BTreeMap<FederateHandle, Option<bool>>,
}

impl SyncPoint {
    pub fn remap_members(&mut self, remap: impl Fn(FederateHandle) -> FederateHandle) {
        self.members = std::mem::take(&mut self.members).into_iter().map(|(f, s)| (remap(f), s)).collect();
    }
}

impl<T: LogicalTime> Federation<T> {
    pub(super) fn register_sync_point(
        &mut self,
        federate: FederateHandle,
        label: &str,
        tag: &Bytes,
        set: Option<&FederateHandleSet>,
    ) {
        let fail = |reason| Callback::SynchronizationPointRegistrationFailed { label: label.to_string(), reason };
        if self.sync_points.contains_key(label) {
            self.send(federate, fail(SyncPointFailureReason::LabelNotUnique));
            return;
        }
        let explicit = set.filter(|s| !s.is_empty());
        if let Some(set) = explicit
            && set.iter().any(|f| !self.federates.contains_key(&f))
        {
            self.send(federate, fail(SyncPointFailureReason::SynchronizationSetMemberNotJoined));
            return;
        }

        let members: BTreeMap<_, _> = match explicit {
            Some(set) => set.iter().map(|f| (f, None)).collect(),
            None => self.federates.keys().map(|f| (*f, None)).collect(),
        };
        info!(federation = %self.name, %federate, label, members = members.len(), "sync point registered");
        let announced: Vec<_> = members.keys().copied().collect();
        self.sync_points.insert(
            label.to_string(),
            SyncPoint { tag: tag.clone(), whole_federation: explicit.is_none(), members },
        );
        self.send(federate, Callback::SynchronizationPointRegistrationSucceeded { label: label.to_string() });
        for member in announced {
            self.send(
                member,
                Callback::AnnounceSynchronizationPoint { label: label.to_string(), tag: tag.clone() },
            );
        }
    }

    /// Enrol a newly joined federate in every whole-federation point
    /// still pending.
    pub(super) fn announce_to_late_joiner(&mut self, federate: FederateHandle) {
        let mut announcements = Vec::new();
        for (label, point) in &mut self.sync_points {
            if point.whole_federation {
                point.members.insert(federate, None);
                announcements.push(Callback::AnnounceSynchronizationPoint {
                    label: label.clone(),
                    tag: point.tag.clone(),
                });
            }
        }
        for callback in announcements {
            self.send(federate, callback);
        }
    }

    /// Achieving the same point twice is a no-op.
    pub(super) fn sync_point_achieved(
        &mut self,
        federate: FederateHandle,
        label: &str,
        successful: bool,
    ) -> Result<(), RtiError> {
        let state = self
            .sync_points
            .get_mut(label)
            .and_then(|p| p.members.get_mut(&federate))
            .ok_or_else(|| RtiError::new(ErrorKind::SynchronizationPointLabelNotAnnounced, label))?;
        if state.is_some() {
            return Ok(());
        }
        *state = Some(successful);
        debug!(%federate, label, successful, "sync point achieved");
        self.check_synchronized(label);
        Ok(())
    }

    fn check_synchronized(&mut self, label: &str) {
        let Some(point) = self.sync_points.get(label) else { return };
        if point.members.values().any(Option::is_none) {
            return;
        }
        let Some(point) = self.sync_points.remove(label) else { return };
        let failed: FederateHandleSet =
            point.members.iter().filter(|(_, s)| **s == Some(false)).map(|(f, _)| *f).collect();
        info!(federation = %self.name, label, failed = failed.len(), "federation synchronized");
        for member in point.members.keys() {
            self.send(
                *member,
                Callback::FederationSynchronized { label: label.to_string(), failed: failed.clone() },
            );
        }
    }

    /// Drop a resigning federate from every point; the rest may now be
    /// synchronized.
    pub(super) fn leave_sync_points(&mut self, federate: FederateHandle) {
        let mut affected = Vec::new();
        for (label, point) in &mut self.sync_points {
            if point.members.remove(&federate).is_some() {
                affected.push(label.clone());
            }
        }
        self.sync_points.retain(|_, p| !p.members.is_empty());
        for label in affected {
            self.check_synchronized(&label);
        }
    }
}
