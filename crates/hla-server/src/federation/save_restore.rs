//! Federation save and restore.
//!
//! A save snapshots the whole federation once every joined federate has
//! reported. A restore swaps that snapshot back in, after matching the
//! joined federates to the saved ones by name and handing each its saved
//! handle.

use std::collections::BTreeMap;

use hla_proto::{
    Callback, ErrorKind, FederateHandle, FederateRestoreStatus, FederateSaveStatus, LogicalTime,
    MessageRetractionHandle, ObjectInstanceHandle, RegionHandle, RestoreFailureReason, RestoreStatus,
    RtiError, SaveFailureReason, SaveStatus,
};
use tracing::{info, warn};

use super::{
    FederateRecord, Federation, Owner, objects::ObjectInstance, regions::Region, sync::SyncPoint,
    time::SentMessage,
};

#[derive(Debug, Clone)]
pub(super) struct SaveSession<T: LogicalTime> {
    label: String,
    time: Option<T>,
    statuses: BTreeMap<FederateHandle, SaveStatus>,
    failed: bool,
}

#[derive(Debug, Clone)]
pub(super) struct RestoreSession {
    label: String,
    /// Post-restore handle to pre-restore handle and progress.
    statuses: BTreeMap<FederateHandle, (FederateHandle, RestoreStatus)>,
}

/// Everything a restore puts back.
#[derive(Debug, Clone)]
pub(super) struct Snapshot<T: LogicalTime> {
    federates: BTreeMap<FederateHandle, FederateRecord<T>>,
    next_federate: u32,
    objects: BTreeMap<ObjectInstanceHandle, ObjectInstance>,
    next_object: u32,
    reserved_names: BTreeMap<String, FederateHandle>,
    regions: BTreeMap<RegionHandle, Region>,
    next_region: u32,
    sync_points: BTreeMap<String, SyncPoint>,
    sent: BTreeMap<MessageRetractionHandle, SentMessage<T>>,
    next_serial: u64,
    next_sequence: u64,
}

impl<T: LogicalTime> Snapshot<T> {
    fn names(&self) -> BTreeMap<&str, FederateHandle> {
        self.federates.values().map(|r| (r.name.as_str(), r.handle)).collect()
    }
}

impl<T: LogicalTime> Federation<T> {
    /// Saves already completed, by label.
    pub fn saved_labels(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    /// True while a save or restore is in progress.
    pub fn in_save_or_restore(&self) -> bool {
        self.save.is_some() || self.restore.is_some()
    }

    /// A newer request replaces a timed save that has not started yet.
    pub(super) fn request_save(
        &mut self,
        federate: FederateHandle,
        label: &str,
        time: Option<T>,
    ) -> Result<(), RtiError> {
        self.check_window("requestFederationSave")?;
        info!(federation = %self.name, %federate, label, ?time, "save requested");
        match time {
            None => {
                self.pending_save = None;
                self.start_save(label.to_string(), None);
            },
            Some(time) => {
                self.pending_save = Some((label.to_string(), time));
                self.check_timed_save();
            },
        }
        Ok(())
    }

    fn start_save(&mut self, label: String, time: Option<T>) {
        let statuses = self.federates.keys().map(|f| (*f, SaveStatus::FederateInstructedToSave)).collect();
        self.broadcast(&Callback::InitiateFederateSave { label: label.clone(), time });
        self.save = Some(SaveSession { label, time, statuses, failed: false });
    }

    /// Start a scheduled save once the federation has reached its time:
    /// every constrained federate, or every federate if none is
    /// constrained.
    pub(super) fn check_timed_save(&mut self) {
        if self.in_save_or_restore() {
            return;
        }
        let Some((_, time)) = &self.pending_save else { return };
        let any_constrained = self.federates.values().any(|r| r.time.constrained);
        let reached = self
            .federates
            .values()
            .filter(|r| r.time.constrained || !any_constrained)
            .all(|r| r.time.current >= *time);
        if !reached {
            return;
        }
        if let Some((label, time)) = self.pending_save.take() {
            self.start_save(label, Some(time));
        }
    }

    fn save_status(&self, federate: FederateHandle) -> Result<SaveStatus, RtiError> {
        self.save
            .as_ref()
            .and_then(|s| s.statuses.get(&federate).copied())
            .ok_or_else(|| RtiError::new(ErrorKind::SaveNotInitiated, federate.to_string()))
    }

    fn set_save_status(&mut self, federate: FederateHandle, status: SaveStatus) {
        if let Some(session) = self.save.as_mut() {
            session.statuses.insert(federate, status);
        }
    }

    pub(super) fn save_begun(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        match self.save_status(federate)? {
            SaveStatus::FederateInstructedToSave => {
                self.set_save_status(federate, SaveStatus::FederateSaving);
                Ok(())
            },
            other => Err(RtiError::new(ErrorKind::SaveNotInitiated, format!("{federate} is {other:?}"))),
        }
    }

    pub(super) fn save_reported(&mut self, federate: FederateHandle, success: bool) -> Result<(), RtiError> {
        match self.save_status(federate)? {
            SaveStatus::FederateSaving => {},
            SaveStatus::FederateInstructedToSave => {
                return Err(RtiError::new(ErrorKind::FederateHasNotBegunSave, federate.to_string()));
            },
            other => {
                return Err(RtiError::new(ErrorKind::SaveNotInitiated, format!("{federate} is {other:?}")));
            },
        }
        self.set_save_status(federate, SaveStatus::FederateWaitingForFederationToSave);
        if !success
            && let Some(session) = self.save.as_mut()
        {
            session.failed = true;
        }
        self.conclude_save_if_complete();
        Ok(())
    }

    fn conclude_save_if_complete(&mut self) {
        let complete = self.save.as_ref().is_some_and(|s| {
            s.statuses.values().all(|status| *status == SaveStatus::FederateWaitingForFederationToSave)
        });
        if !complete {
            return;
        }
        let Some(session) = self.save.take() else { return };
        if session.failed {
            warn!(federation = %self.name, label = %session.label, "federation not saved");
            self.broadcast(&Callback::FederationNotSaved { reason: SaveFailureReason::FederateReportedFailure });
            return;
        }
        let snapshot = self.snapshot();
        info!(
            federation = %self.name,
            label = %session.label,
            time = ?session.time,
            federates = snapshot.federates.len(),
            "federation saved"
        );
        self.snapshots.insert(session.label, snapshot);
        self.broadcast(&Callback::FederationSaved);
    }

    /// A scheduled save that has not started yet is simply dropped.
    pub(super) fn abort_save(&mut self) -> Result<(), RtiError> {
        if self.save.is_none() && self.pending_save.take().is_some() {
            return Ok(());
        }
        let session = self
            .save
            .take()
            .ok_or_else(|| RtiError::new(ErrorKind::SaveNotInProgress, "abortFederationSave"))?;
        info!(federation = %self.name, label = %session.label, "save aborted");
        self.broadcast(&Callback::FederationNotSaved { reason: SaveFailureReason::SaveAborted });
        Ok(())
    }

    pub(super) fn query_save_status(&mut self, federate: FederateHandle) {
        let statuses = self
            .federates
            .keys()
            .map(|f| FederateSaveStatus {
                federate: *f,
                status: self
                    .save
                    .as_ref()
                    .and_then(|s| s.statuses.get(f).copied())
                    .unwrap_or(SaveStatus::NoSaveInProgress),
            })
            .collect();
        self.send(federate, Callback::FederationSaveStatusResponse { statuses });
    }

    /// A federate leaving mid-save or mid-restore fails it for everyone
    /// else. Returns the handle the leaving federate holds afterwards.
    pub(super) fn leave_save(&mut self, federate: FederateHandle) -> FederateHandle {
        if self.save.as_ref().is_some_and(|s| s.statuses.contains_key(&federate)) {
            self.save = None;
            warn!(federation = %self.name, %federate, "save failed by resignation");
            for other in self.others(federate) {
                self.send(other, Callback::FederationNotSaved { reason: SaveFailureReason::FederateResigned });
            }
        }
        let Some(session) = self.restore.take_if(|s| s.statuses.contains_key(&federate)) else {
            return federate;
        };
        let leaving = session.statuses.get(&federate).map_or(federate, |(pre, _)| *pre);
        self.undo_remap(&session);
        warn!(federation = %self.name, %federate, "restore failed by resignation");
        for other in self.others(leaving) {
            self.send(other, Callback::FederationNotRestored { reason: RestoreFailureReason::FederateResigned });
        }
        leaving
    }

    fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            federates: self.federates.clone(),
            next_federate: self.next_federate,
            objects: self.objects.clone(),
            next_object: self.next_object,
            reserved_names: self.reserved_names.clone(),
            regions: self.regions.clone(),
            next_region: self.next_region,
            sync_points: self.sync_points.clone(),
            sent: self.sent.clone(),
            next_serial: self.next_serial,
            next_sequence: self.next_sequence,
        }
    }

    /// The joined federates must match the saved ones name for name.
    ///
    /// Federates take their saved handles as the restore begins and get
    /// their old ones back if it fails or is aborted.
    pub(super) fn request_restore(&mut self, federate: FederateHandle, label: &str) -> Result<(), RtiError> {
        self.check_window("requestFederationRestore")?;
        let mapping: Option<BTreeMap<FederateHandle, FederateHandle>> =
            self.snapshots.get(label).and_then(|snapshot| {
                let saved = snapshot.names();
                if saved.len() != self.federates.len() {
                    return None;
                }
                self.federates
                    .values()
                    .map(|r| saved.get(r.name.as_str()).map(|post| (r.handle, *post)))
                    .collect()
            });
        let Some(mapping) = mapping else {
            warn!(federation = %self.name, %federate, label, "restore request failed");
            self.send(federate, Callback::RequestFederationRestoreFailed { label: label.to_string() });
            return Ok(());
        };

        info!(federation = %self.name, %federate, label, "restore begun");
        self.send(federate, Callback::RequestFederationRestoreSucceeded { label: label.to_string() });
        self.remap_handles(&mapping);
        self.restore = Some(RestoreSession {
            label: label.to_string(),
            statuses: mapping
                .iter()
                .map(|(pre, post)| (*post, (*pre, RestoreStatus::FederateRestoreRequestPending)))
                .collect(),
        });
        self.broadcast(&Callback::FederationRestoreBegun);
        let initiations: Vec<_> = self
            .federates
            .values()
            .map(|r| {
                (r.handle, Callback::InitiateFederateRestore {
                    label: label.to_string(),
                    federate_name: r.name.clone(),
                    federate: r.handle,
                })
            })
            .collect();
        for (handle, callback) in initiations {
            self.send(handle, callback);
        }
        Ok(())
    }

    /// Rename every federate handle the live state refers to.
    fn remap_handles(&mut self, mapping: &BTreeMap<FederateHandle, FederateHandle>) {
        let remap = |h: FederateHandle| mapping.get(&h).copied().unwrap_or(h);
        self.federates = std::mem::take(&mut self.federates)
            .into_values()
            .map(|mut record| {
                record.handle = remap(record.handle);
                (record.handle, record)
            })
            .collect();
        for instance in self.objects.values_mut() {
            instance.registrant = remap(instance.registrant);
            for state in instance.attributes.values_mut() {
                if let Owner::Federate(owner) = state.owner {
                    state.owner = Owner::Federate(remap(owner));
                }
                if let Some(pending) = state.acquirer.as_mut() {
                    pending.federate = remap(pending.federate);
                }
            }
        }
        for owner in self.reserved_names.values_mut() {
            *owner = remap(*owner);
        }
        for region in self.regions.values_mut() {
            region.owner = remap(region.owner);
        }
        for point in self.sync_points.values_mut() {
            point.remap_members(remap);
        }
        self.remap_messages(remap);
    }

    /// Give every federate back the handle it held before `session` began.
    fn undo_remap(&mut self, session: &RestoreSession) {
        let inverse = session.statuses.iter().map(|(post, (pre, _))| (*post, *pre)).collect();
        self.remap_handles(&inverse);
    }

    fn restore_status(&self, federate: FederateHandle) -> Result<RestoreStatus, RtiError> {
        self.restore
            .as_ref()
            .and_then(|s| s.statuses.get(&federate).map(|(_, status)| *status))
            .ok_or_else(|| RtiError::new(ErrorKind::RestoreNotRequested, federate.to_string()))
    }

    pub(super) fn restore_reported(&mut self, federate: FederateHandle, success: bool) -> Result<(), RtiError> {
        let status = self.restore_status(federate)?;
        if status != RestoreStatus::FederateRestoreRequestPending {
            return Err(RtiError::new(ErrorKind::RestoreNotRequested, format!("{federate} is {status:?}")));
        }
        let next = if success {
            RestoreStatus::FederateWaitingForRestoreToFinish
        } else {
            RestoreStatus::FederateRestoreFailed
        };
        if let Some((_, status)) = self.restore.as_mut().and_then(|s| s.statuses.get_mut(&federate)) {
            *status = next;
        }
        self.conclude_restore_if_complete();
        Ok(())
    }

    fn conclude_restore_if_complete(&mut self) {
        let complete = self.restore.as_ref().is_some_and(|s| {
            s.statuses.values().all(|(_, status)| *status != RestoreStatus::FederateRestoreRequestPending)
        });
        if !complete {
            return;
        }
        let Some(session) = self.restore.take() else { return };
        let failed = session.statuses.values().any(|(_, status)| *status == RestoreStatus::FederateRestoreFailed);
        if failed {
            self.undo_remap(&session);
            warn!(federation = %self.name, label = %session.label, "federation not restored");
            self.broadcast(&Callback::FederationNotRestored {
                reason: RestoreFailureReason::FederateReportedFailure,
            });
            return;
        }
        let Some(snapshot) = self.snapshots.get(&session.label).cloned() else {
            self.undo_remap(&session);
            self.broadcast(&Callback::FederationNotRestored { reason: RestoreFailureReason::RtiUnableToRestore });
            return;
        };
        self.reinstate(snapshot);
        info!(federation = %self.name, label = %session.label, "federation restored");
        self.broadcast(&Callback::FederationRestored);
    }

    /// Swap `snapshot` in while keeping today's connections.
    fn reinstate(&mut self, snapshot: Snapshot<T>) {
        let connections: BTreeMap<_, _> = self.federates.values().map(|r| (r.handle, r.connection)).collect();
        self.federates = snapshot
            .federates
            .into_iter()
            .filter_map(|(handle, mut record)| {
                record.connection = *connections.get(&handle)?;
                Some((handle, record))
            })
            .collect();
        self.next_federate = snapshot.next_federate;
        self.objects = snapshot.objects;
        self.next_object = snapshot.next_object;
        self.reserved_names = snapshot.reserved_names;
        self.regions = snapshot.regions;
        self.next_region = snapshot.next_region;
        self.sync_points = snapshot.sync_points;
        self.sent = snapshot.sent;
        self.next_serial = snapshot.next_serial;
        self.next_sequence = snapshot.next_sequence;
        self.pending_save = None;
    }

    pub(super) fn abort_restore(&mut self) -> Result<(), RtiError> {
        let session = self
            .restore
            .take()
            .ok_or_else(|| RtiError::new(ErrorKind::RestoreNotInProgress, "abortFederationRestore"))?;
        self.undo_remap(&session);
        info!(federation = %self.name, label = %session.label, "restore aborted");
        self.broadcast(&Callback::FederationNotRestored { reason: RestoreFailureReason::RestoreAborted });
        Ok(())
    }

    pub(super) fn query_restore_status(&mut self, federate: FederateHandle) {
        let statuses = self
            .federates
            .keys()
            .map(|f| {
                let (pre_restore, status) = self
                    .restore
                    .as_ref()
                    .and_then(|s| s.statuses.get(f).copied())
                    .unwrap_or((*f, RestoreStatus::NoRestoreInProgress));
                FederateRestoreStatus { pre_restore, post_restore: *f, status }
            })
            .collect();
        self.send(federate, Callback::FederationRestoreStatusResponse { statuses });
    }
}
