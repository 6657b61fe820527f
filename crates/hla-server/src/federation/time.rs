//! Logical time: regulation, constraint, grants and timestamp-ordered
//! delivery.
//!
//! GALT of a federate is the smallest `base + lookahead` over every other
//! regulating federate, where `base` is the requested time of a pending
//! advance or the granted time otherwise. A constrained federate is never
//! granted past its GALT (or up to it, for the *Available variants), and
//! timestamp-ordered messages wait in its queue until a grant reaches
//! their time.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use hla_proto::{
    AdvanceKind, Callback, ErrorKind, FederateHandle, LogicalTime, LogicalTimeInterval,
    MessageRetractionHandle, OrderType, RtiError,
};
use tracing::{debug, trace};

use super::Federation;

/// Timestamp and retraction handle of a timestamp-ordered message.
#[derive(Debug, Clone, Copy)]
pub(super) struct Stamp<T: LogicalTime> {
    pub time: T,
    pub retraction: MessageRetractionHandle,
}

#[derive(Debug, Clone)]
pub(super) struct Queued<T: LogicalTime> {
    retraction: MessageRetractionHandle,
    callback: Callback<T>,
}

/// Receivers of a timestamp-ordered message that already saw it.
///
/// Kept while the sender may still retract the message: dropped once the
/// sender is granted its time, or when the sender resigns.
#[derive(Debug, Clone)]
pub(super) struct SentMessage<T: LogicalTime> {
    time: T,
    delivered: BTreeSet<FederateHandle>,
    retracted: bool,
}

#[derive(Debug, Clone)]
pub(super) struct FederateTime<T: LogicalTime> {
    pub current: T,
    pub regulating: bool,
    pub lookahead: Option<T::Interval>,
    pub constrained: bool,
    pub advance: Option<(AdvanceKind, T)>,
    pub asynchronous_delivery: bool,
    queue: BTreeMap<(T, u64), Queued<T>>,
    /// Receive-order messages held while constrained and not advancing.
    held: VecDeque<Callback<T>>,
}

impl<T: LogicalTime> Default for FederateTime<T> {
    fn default() -> Self {
        Self {
            current: T::initial(),
            regulating: false,
            lookahead: None,
            constrained: false,
            advance: None,
            asynchronous_delivery: false,
            queue: BTreeMap::new(),
            held: VecDeque::new(),
        }
    }
}

impl<T: LogicalTime> FederateTime<T> {
    /// Earliest time another federate may still receive a message from
    /// this one at, if it regulates.
    fn bound(&self) -> Option<T> {
        if !self.regulating {
            return None;
        }
        let base = match self.advance {
            Some((kind, requested)) if kind.is_next_message() => {
                self.queue.keys().next().map_or(requested, |(t, _)| requested.min(*t))
            },
            Some((_, requested)) => requested,
            None => self.current,
        };
        let lookahead = self.lookahead.unwrap_or_else(T::Interval::zero);
        Some(base.add(lookahead).unwrap_or_else(|_| T::final_time()))
    }

    fn earliest_send(&self) -> Result<T, RtiError> {
        let base = self.advance.map_or(self.current, |(_, requested)| requested);
        base.add(self.lookahead.unwrap_or_else(T::Interval::zero))
    }

    fn can_receive_now(&self) -> bool {
        !self.constrained || self.asynchronous_delivery || self.advance.is_some()
    }
}

/// Rewrite a timestamp-ordered message for a receiver that gets it in
/// receive order.
fn as_receive_order<T: LogicalTime>(callback: &mut Callback<T>) {
    if let Callback::ReflectAttributeValues { info, .. }
    | Callback::ReceiveInteraction { info, .. }
    | Callback::RemoveObjectInstance { info, .. } = callback
    {
        info.order = OrderType::Receive;
        info.retraction = None;
    }
}

impl<T: LogicalTime> Federation<T> {
    pub(super) fn enable_time_regulation(
        &mut self,
        federate: FederateHandle,
        lookahead: T::Interval,
    ) -> Result<(), RtiError> {
        let clock = &self.record(federate)?.time;
        if clock.regulating {
            return Err(RtiError::new(ErrorKind::TimeRegulationAlreadyEnabled, "enableTimeRegulation"));
        }
        if clock.advance.is_some() {
            return Err(RtiError::new(ErrorKind::InTimeAdvancingState, "enableTimeRegulation"));
        }
        if lookahead.is_zero() {
            return Err(RtiError::new(ErrorKind::InvalidLookahead, lookahead.to_string()));
        }

        // No constrained federate may already be past the new regulator.
        let floor = self
            .federates
            .values()
            .filter(|r| r.handle != federate && r.time.constrained)
            .map(|r| r.time.current)
            .max();
        let record = self.record_mut(federate)?;
        let time = floor.map_or(record.time.current, |f| f.max(record.time.current));
        record.time.regulating = true;
        record.time.lookahead = Some(lookahead);
        record.time.current = time;
        debug!(%federate, %time, %lookahead, "time regulation enabled");
        self.send(federate, Callback::TimeRegulationEnabled { time });
        Ok(())
    }

    pub(super) fn disable_time_regulation(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if !record.time.regulating {
            return Err(RtiError::new(ErrorKind::TimeRegulationIsNotEnabled, "disableTimeRegulation"));
        }
        record.time.regulating = false;
        record.time.lookahead = None;
        Ok(())
    }

    pub(super) fn enable_time_constrained(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if record.time.constrained {
            return Err(RtiError::new(ErrorKind::TimeConstrainedAlreadyEnabled, "enableTimeConstrained"));
        }
        if record.time.advance.is_some() {
            return Err(RtiError::new(ErrorKind::InTimeAdvancingState, "enableTimeConstrained"));
        }
        record.time.constrained = true;
        let time = record.time.current;
        debug!(%federate, %time, "time constrained enabled");
        self.send(federate, Callback::TimeConstrainedEnabled { time });
        Ok(())
    }

    pub(super) fn disable_time_constrained(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if !record.time.constrained {
            return Err(RtiError::new(ErrorKind::TimeConstrainedIsNotEnabled, "disableTimeConstrained"));
        }
        record.time.constrained = false;
        self.release_queue(federate, None, true);
        self.release_held(federate);
        Ok(())
    }

    pub(super) fn request_advance(
        &mut self,
        federate: FederateHandle,
        kind: AdvanceKind,
        time: T,
    ) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if record.time.advance.is_some() {
            return Err(RtiError::new(ErrorKind::InTimeAdvancingState, kind.to_string()));
        }
        if time <= record.time.current {
            return Err(RtiError::new(
                ErrorKind::LogicalTimeAlreadyPassed,
                format!("{kind}({time}) at {}", record.time.current),
            ));
        }
        record.time.advance = Some((kind, time));
        trace!(%federate, %kind, %time, "advance requested");
        self.release_held(federate);
        Ok(())
    }

    pub(super) fn set_asynchronous_delivery(
        &mut self,
        federate: FederateHandle,
        enabled: bool,
    ) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if record.time.asynchronous_delivery == enabled {
            let kind = if enabled {
                ErrorKind::AsynchronousDeliveryAlreadyEnabled
            } else {
                ErrorKind::AsynchronousDeliveryAlreadyDisabled
            };
            return Err(RtiError::new(kind, federate.to_string()));
        }
        record.time.asynchronous_delivery = enabled;
        if enabled {
            self.release_held(federate);
        }
        Ok(())
    }

    pub(super) fn modify_lookahead(
        &mut self,
        federate: FederateHandle,
        lookahead: T::Interval,
    ) -> Result<(), RtiError> {
        let record = self.record_mut(federate)?;
        if !record.time.regulating {
            return Err(RtiError::new(ErrorKind::TimeRegulationIsNotEnabled, "modifyLookahead"));
        }
        if record.time.advance.is_some() {
            return Err(RtiError::new(ErrorKind::InTimeAdvancingState, "modifyLookahead"));
        }
        if lookahead.is_zero() {
            return Err(RtiError::new(ErrorKind::InvalidLookahead, lookahead.to_string()));
        }
        record.time.lookahead = Some(lookahead);
        Ok(())
    }

    /// Greatest available logical time of `federate`; `None` when no other
    /// federate regulates.
    pub fn galt(&self, federate: FederateHandle) -> Option<T> {
        self.federates
            .values()
            .filter(|r| r.handle != federate)
            .filter_map(|r| r.time.bound())
            .min()
    }

    /// Least incoming timestamp: the earliest message waiting for
    /// `federate`, if any.
    pub(super) fn lits(&self, federate: FederateHandle) -> Option<T> {
        self.federates
            .get(&federate)
            .and_then(|r| r.time.queue.keys().next().map(|(t, _)| *t))
    }

    /// Validate the timestamp of an outgoing message and allocate its
    /// retraction handle. Only regulating senders produce timestamp-ordered
    /// messages.
    pub(super) fn stamp(
        &mut self,
        federate: FederateHandle,
        time: Option<T>,
    ) -> Result<Option<Stamp<T>>, RtiError> {
        let Some(time) = time else { return Ok(None) };
        let clock = &self.record(federate)?.time;
        if !clock.regulating {
            return Ok(None);
        }
        let earliest = clock.earliest_send()?;
        if time < earliest {
            return Err(RtiError::new(
                ErrorKind::InvalidLogicalTime,
                format!("timestamp {time} is before {earliest}"),
            ));
        }
        self.next_serial += 1;
        let retraction = MessageRetractionHandle::new(self.next_serial, federate);
        self.sent.insert(retraction, SentMessage { time, delivered: BTreeSet::new(), retracted: false });
        Ok(Some(Stamp { time, retraction }))
    }

    /// Route one message to `receiver`, queueing or holding it as its time
    /// state requires.
    pub(super) fn deliver(
        &mut self,
        receiver: FederateHandle,
        mut callback: Callback<T>,
        stamp: Option<Stamp<T>>,
    ) {
        let Some(record) = self.federates.get_mut(&receiver) else { return };
        if let Some(stamp) = stamp {
            if record.time.constrained {
                self.next_sequence += 1;
                record.time.queue.insert(
                    (stamp.time, self.next_sequence),
                    Queued { retraction: stamp.retraction, callback },
                );
                return;
            }
            as_receive_order(&mut callback);
            if let Some(sent) = self.sent.get_mut(&stamp.retraction) {
                sent.delivered.insert(receiver);
            }
        }
        if record.time.can_receive_now() {
            self.send(receiver, callback);
        } else {
            record.time.held.push_back(callback);
        }
    }

    fn release_held(&mut self, federate: FederateHandle) {
        let held = match self.federates.get_mut(&federate) {
            Some(record) => std::mem::take(&mut record.time.held),
            None => return,
        };
        for callback in held {
            self.send(federate, callback);
        }
    }

    /// Deliver queued messages with a timestamp up to `limit` (all of them
    /// for `None`). Messages released to an unconstrained federate become
    /// receive-order.
    fn release_queue(&mut self, federate: FederateHandle, limit: Option<T>, downgrade: bool) {
        let released: Vec<Queued<T>> = match self.federates.get_mut(&federate) {
            Some(record) => {
                let keep = match limit {
                    Some(limit) => record.time.queue.split_off(&(limit, u64::MAX)),
                    None => BTreeMap::new(),
                };
                std::mem::replace(&mut record.time.queue, keep).into_values().collect()
            },
            None => return,
        };
        for mut queued in released {
            if let Some(sent) = self.sent.get_mut(&queued.retraction) {
                sent.delivered.insert(federate);
            }
            if downgrade {
                as_receive_order(&mut queued.callback);
            }
            self.send(federate, queued.callback);
        }
    }

    /// Time a pending advance of `federate` can be granted at right now.
    fn grantable(&self, federate: FederateHandle) -> Option<T> {
        let clock = &self.federates.get(&federate)?.time;
        let (kind, requested) = clock.advance?;
        if !clock.constrained {
            return Some(requested);
        }
        let galt = self.galt(federate);
        let below = |t: T| match galt {
            None => true,
            Some(galt) if kind.is_available_variant() => t <= galt,
            Some(galt) => t < galt,
        };
        let next_message = clock.queue.keys().next().map(|(t, _)| *t);
        match kind {
            AdvanceKind::TimeAdvance | AdvanceKind::TimeAdvanceAvailable => {
                below(requested).then_some(requested)
            },
            AdvanceKind::NextMessage | AdvanceKind::NextMessageAvailable => {
                let target = next_message.map_or(requested, |t| t.min(requested)).max(clock.current);
                below(target).then_some(target)
            },
            AdvanceKind::FlushQueue => {
                let mut target = requested;
                if let Some(galt) = galt {
                    target = target.min(galt);
                }
                if let Some(next) = next_message {
                    target = target.min(next);
                }
                Some(target.max(clock.current))
            },
        }
    }

    /// Grant every advance that has become grantable, repeating until no
    /// further grant is possible. Grants pause during a save or restore.
    pub(super) fn process_grants(&mut self) {
        while self.save.is_none() && self.restore.is_none() {
            let next = self
                .federates
                .keys()
                .copied()
                .find_map(|f| self.grantable(f).map(|time| (f, time)));
            let Some((federate, time)) = next else { break };
            self.grant(federate, time);
        }
    }

    fn grant(&mut self, federate: FederateHandle, time: T) {
        let Some(record) = self.federates.get(&federate) else { return };
        let flush = matches!(record.time.advance, Some((AdvanceKind::FlushQueue, _)));
        if record.time.constrained {
            self.release_queue(federate, if flush { None } else { Some(time) }, false);
        }
        if let Some(record) = self.federates.get_mut(&federate) {
            record.time.current = time;
            record.time.advance = None;
        }
        self.forget_sent(federate, Some(time));
        debug!(%federate, %time, "time advance granted");
        self.send(federate, Callback::TimeAdvanceGrant { time });
        self.check_timed_save();
    }

    pub(super) fn retract(
        &mut self,
        federate: FederateHandle,
        handle: MessageRetractionHandle,
    ) -> Result<(), RtiError> {
        let current = self.record(federate)?.time.current;
        if handle.federate() != federate {
            return Err(RtiError::new(
                ErrorKind::InvalidMessageRetractionHandle,
                format!("{handle:?} was not sent by {federate}"),
            ));
        }
        let Some(sent) = self.sent.get_mut(&handle) else {
            // Issued by this federate and dropped once a grant passed its time.
            let kind = if (1..=self.next_serial).contains(&handle.serial()) {
                ErrorKind::MessageCanNoLongerBeRetracted
            } else {
                ErrorKind::InvalidMessageRetractionHandle
            };
            return Err(RtiError::new(kind, format!("{handle:?}")));
        };
        if sent.retracted {
            return Err(RtiError::new(
                ErrorKind::InvalidMessageRetractionHandle,
                format!("{handle:?} already retracted"),
            ));
        }
        if sent.time <= current {
            return Err(RtiError::new(
                ErrorKind::MessageCanNoLongerBeRetracted,
                format!("message at {} with time at {current}", sent.time),
            ));
        }

        sent.retracted = true;
        let delivered = std::mem::take(&mut sent.delivered);
        for record in self.federates.values_mut() {
            record.time.queue.retain(|_, queued| queued.retraction != handle);
        }
        for receiver in delivered {
            self.send(receiver, Callback::RequestRetraction { handle });
        }
        debug!(%federate, serial = handle.serial(), "message retracted");
        Ok(())
    }

    /// Drop the retraction records of messages from `federate` timestamped
    /// up to `through`, or all of them for `None`.
    pub(super) fn forget_sent(&mut self, federate: FederateHandle, through: Option<T>) {
        self.sent.retain(|handle, sent| {
            handle.federate() != federate || through.is_some_and(|through| sent.time > through)
        });
    }

    /// Rewrite the federate part of every outstanding retraction handle.
    pub(super) fn remap_messages(&mut self, remap: impl Fn(FederateHandle) -> FederateHandle) {
        let rehandle = |h: MessageRetractionHandle| MessageRetractionHandle::new(h.serial(), remap(h.federate()));
        self.sent = std::mem::take(&mut self.sent)
            .into_iter()
            .map(|(handle, sent)| {
                let delivered = sent.delivered.into_iter().map(&remap).collect();
                (rehandle(handle), SentMessage { time: sent.time, delivered, retracted: sent.retracted })
            })
            .collect();
        for record in self.federates.values_mut() {
            for queued in record.time.queue.values_mut() {
                queued.retraction = rehandle(queued.retraction);
            }
        }
    }
}
