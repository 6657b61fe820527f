//! Fuzz target for the [`Federate`] state machines against the in-process RTI
//!
//! Find call sequences where the local view of a federate drifts from what
//! the RTI confirmed
//!
//! # Strategy
//!
//! - Two federates: each a bare `Federate` driving its own connection, so
//!   every check/call/record step is visible
//! - Event sequences: arbitrary federation, declaration, object, time,
//!   synchronization, save and ownership calls in any order
//! - Delivery: callbacks are drained per federate at arbitrary points
//!
//! # Invariants
//!
//! - `record` NEVER fails for a request the RTI accepted
//! - Logical time never decreases within one membership
//! - No attribute is owned by both federates once callbacks are drained
//! - NEVER panic on out-of-order calls or stale callbacks

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use bytes::Bytes;
use hla_core::{Dispatch, Federate, RtiConnection};
use hla_proto::{
    AdvanceKind, AttributeHandle, AttributeHandleSet, AttributeValues, CallbackModel, FomModule,
    Integer64Interval, Integer64Time, ObjectClassHandle, ObjectInstanceHandle, RegionHandleSet,
    ResignAction, ServiceRequest, ServiceResponse,
};
use hla_server::{LocalConnection, LocalRti, ObjectModel};
use libfuzzer_sys::fuzz_target;

const FEDERATION: &str = "fuzz";
const ATTRIBUTES: [&str; 3] = ["position", "speed", "fuel"];

type Request = ServiceRequest<Integer64Time>;

#[derive(Debug, Clone, Arbitrary)]
enum FederateEvent {
    Join,
    Resign { divest: bool },
    Publish,
    Subscribe,
    Register,
    Update { object: u8, attribute: u8 },
    EnableRegulation { lookahead: u8 },
    EnableConstrained,
    AdvanceTo { time: u16, next_message: bool },
    RegisterSync { label: u8 },
    Achieve { label: u8 },
    RequestSave { label: u8 },
    SaveBegun,
    SaveComplete,
    Divest { object: u8, attribute: u8, negotiated: bool },
    Acquire { object: u8, attribute: u8, if_available: bool },
    ReleaseResponse { object: u8, attribute: u8 },
    CancelAcquisition { object: u8, attribute: u8 },
    Deliver,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    /// Each step picks a federate (low bit) and an event.
    events: Vec<(u8, FederateEvent)>,
}

struct Handles {
    class: ObjectClassHandle,
    attributes: Vec<AttributeHandle>,
}

struct Participant {
    name: String,
    connection: LocalConnection<Integer64Time>,
    federate: Federate<Integer64Time>,
    joins: u32,
    last_time: (u32, i64),
}

impl Participant {
    fn new(rti: &LocalRti<Integer64Time>, index: usize) -> Self {
        let connection = match rti.connect() {
            Ok(connection) => connection,
            Err(err) => panic!("connect failed: {err}"),
        };
        let mut participant = Self {
            name: format!("fed{index}"),
            connection,
            federate: Federate::default(),
            joins: 0,
            last_time: (0, 0),
        };
        participant.call(&Request::Connect { callback_model: CallbackModel::Evoked });
        participant
    }

    /// Check, send and record one request. Returns the response if the RTI
    /// accepted it.
    fn call(&mut self, request: &Request) -> Option<ServiceResponse<Integer64Time>> {
        match self.federate.check(request) {
            Ok(Dispatch::Forward) => {},
            Ok(Dispatch::AlreadySatisfied) | Err(_) => return None,
        }
        let response = self.connection.call(request).ok()?;
        if let Err(err) = self.federate.record(request, &response) {
            panic!("{}: record {} failed after acceptance: {err}", self.name, request.name());
        }
        if matches!(request, Request::JoinFederationExecution { .. }) {
            self.joins += 1;
        }
        Some(response)
    }

    fn deliver(&mut self) {
        while let Ok(Some(callback)) = self.connection.poll_callback(Duration::ZERO) {
            // Stale callbacks after a resign are rejected, never applied.
            let _ = self.federate.apply_callback(&callback);
        }
    }

    fn check_time(&mut self) {
        if !self.federate.membership().is_joined() {
            return;
        }
        let now = i64::from(self.federate.time().current());
        let (joins, previous) = self.last_time;
        if joins == self.joins {
            assert!(now >= previous, "{}: time went back from {previous} to {now}", self.name);
        }
        self.last_time = (self.joins, now);
    }
}

fn fom() -> FomModule {
    FomModule::new(FEDERATION).object_class("Vehicle", None, &ATTRIBUTES)
}

fn handles() -> Handles {
    let model = match ObjectModel::build(&[fom()]) {
        Ok(model) => model,
        Err(err) => panic!("object model: {err}"),
    };
    let class = match model.object_class_handle("Vehicle") {
        Ok(class) => class,
        Err(err) => panic!("class: {err}"),
    };
    let attributes = ATTRIBUTES
        .iter()
        .filter_map(|name| model.attribute_handle(class, name).ok())
        .collect();
    Handles { class, attributes }
}

fn pick<T: Copy>(items: &[T], index: u8) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    items.get(usize::from(index) % items.len()).copied()
}

fn single(attribute: AttributeHandle) -> AttributeHandleSet {
    std::iter::once(attribute).collect()
}

fn time(value: u16) -> Option<Integer64Time> {
    Integer64Time::new(i64::from(value)).ok()
}

fn request_for(
    event: &FederateEvent,
    handles: &Handles,
    objects: &[ObjectInstanceHandle],
) -> Option<Request> {
    let all: AttributeHandleSet = handles.attributes.iter().copied().collect();
    let target = |object: u8, attribute: u8| {
        Some((pick(objects, object)?, single(pick(&handles.attributes, attribute)?)))
    };

    let request = match *event {
        FederateEvent::Join => Request::JoinFederationExecution {
            federate_name: None,
            federate_type: "fuzz".to_string(),
            federation: FEDERATION.to_string(),
        },
        FederateEvent::Resign { divest } => Request::ResignFederationExecution {
            action: if divest {
                ResignAction::CancelThenDeleteThenDivest
            } else {
                ResignAction::DeleteObjects
            },
        },
        FederateEvent::Publish => {
            Request::PublishObjectClassAttributes { class: handles.class, attributes: all }
        },
        FederateEvent::Subscribe => Request::SubscribeObjectClassAttributes {
            class: handles.class,
            attributes: all,
            passive: false,
            regions: RegionHandleSet::new(),
        },
        FederateEvent::Register => {
            Request::RegisterObjectInstance { class: handles.class, name: None, regions: Vec::new() }
        },
        FederateEvent::Update { object, attribute } => {
            let object = pick(objects, object)?;
            let mut values = AttributeValues::new();
            values.add(pick(&handles.attributes, attribute)?, vec![attribute]).ok()?;
            Request::UpdateAttributeValues { object, values, tag: Bytes::new(), time: None }
        },
        FederateEvent::EnableRegulation { lookahead } => Request::EnableTimeRegulation {
            lookahead: Integer64Interval::new(i64::from(lookahead % 8)).ok()?,
        },
        FederateEvent::EnableConstrained => Request::EnableTimeConstrained,
        FederateEvent::AdvanceTo { time: to, next_message } => Request::TimeAdvance {
            kind: if next_message { AdvanceKind::NextMessage } else { AdvanceKind::TimeAdvance },
            time: time(to)?,
        },
        FederateEvent::RegisterSync { label } => Request::RegisterFederationSynchronizationPoint {
            label: format!("sync{}", label % 4),
            tag: Bytes::new(),
            federates: None,
        },
        FederateEvent::Achieve { label } => Request::SynchronizationPointAchieved {
            label: format!("sync{}", label % 4),
            successful: true,
        },
        FederateEvent::RequestSave { label } => {
            Request::RequestFederationSave { label: format!("save{}", label % 4), time: None }
        },
        FederateEvent::SaveBegun => Request::FederateSaveBegun,
        FederateEvent::SaveComplete => Request::FederateSaveComplete,
        FederateEvent::Divest { object, attribute, negotiated } => {
            let (object, attributes) = target(object, attribute)?;
            if negotiated {
                Request::NegotiatedAttributeOwnershipDivestiture {
                    object,
                    attributes,
                    tag: Bytes::new(),
                }
            } else {
                Request::UnconditionalAttributeOwnershipDivestiture { object, attributes }
            }
        },
        FederateEvent::Acquire { object, attribute, if_available } => {
            let (object, attributes) = target(object, attribute)?;
            if if_available {
                Request::AttributeOwnershipAcquisitionIfAvailable { object, attributes }
            } else {
                Request::AttributeOwnershipAcquisition { object, attributes, tag: Bytes::new() }
            }
        },
        FederateEvent::ReleaseResponse { object, attribute } => {
            let (object, attributes) = target(object, attribute)?;
            Request::AttributeOwnershipReleaseResponse { object, attributes }
        },
        FederateEvent::CancelAcquisition { object, attribute } => {
            let (object, attributes) = target(object, attribute)?;
            Request::CancelAttributeOwnershipAcquisition { object, attributes }
        },
        FederateEvent::Deliver => return None,
    };
    Some(request)
}

fn check_single_owner(
    participants: &[Participant],
    handles: &Handles,
    objects: &[ObjectInstanceHandle],
) {
    for &object in objects {
        for &attribute in &handles.attributes {
            let owners = participants
                .iter()
                .filter(|p| p.federate.membership().is_joined())
                .filter(|p| p.federate.ownership().is_owned(object, attribute))
                .count();
            assert!(owners <= 1, "{object:?} {attribute:?} owned by {owners} federates");
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let handles = handles();
    let rti = LocalRti::<Integer64Time>::default();
    let mut participants = [Participant::new(&rti, 0), Participant::new(&rti, 1)];
    participants[0].call(&Request::CreateFederationExecution {
        federation: FEDERATION.to_string(),
        modules: vec![fom()],
    });
    let mut objects: Vec<ObjectInstanceHandle> = Vec::new();

    for (selector, event) in input.events.iter().take(512) {
        let participant = &mut participants[usize::from(selector & 1)];

        match request_for(event, &handles, &objects) {
            Some(request) => {
                if let Some(ServiceResponse::ObjectInstance(object)) = participant.call(&request) {
                    objects.push(object);
                }
            },
            None if matches!(event, FederateEvent::Deliver) => {
                participant.deliver();
            },
            None => {},
        }
        participant.check_time();
    }

    for participant in &mut participants {
        participant.deliver();
        participant.check_time();
    }
    check_single_owner(&participants, &handles, &objects);
});
