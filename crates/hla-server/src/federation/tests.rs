use bytes::Bytes;
use hla_proto::{
    AdvanceKind, AttributeHandleSet, AttributeRegions, AttributeValues, DimensionHandleSet,
    FederateHandleSet, FomModule, Integer64Interval, Integer64Time, ParameterValues, RangeBounds,
    RegionExtents, RegionHandleSet, RestoreFailureReason, RestoreStatus, SaveFailureReason, SaveStatus,
    SyncPointFailureReason,
};

use super::*;

type Fed = Federation<Integer64Time>;
type Cb = Callback<Integer64Time>;
type Req = ServiceRequest<Integer64Time>;

pub(crate) fn vehicles() -> hla_proto::FomModule {
    FomModule::new("vehicles")
        .object_class("Vehicle", None, &["position", "velocity"])
        .object_class("Car", Some("Vehicle"), &["doors"])
        .rti_owned_attribute("registry")
        .interaction_class("Collision", None, &["severity"])
        .interaction_class("Crash", Some("Collision"), &["injuries"])
        .dimension("x", 100)
}

fn federation() -> Fed {
    Federation::new("test", ObjectModel::build(&[vehicles()]).unwrap())
}

/// Join federates `fed1..=fedN` over connections `1..=N`; handle `n`
/// belongs to connection `n`.
fn joined(count: u64) -> (Fed, Vec<FederateHandle>) {
    let mut fed = federation();
    let handles = (1..=count)
        .map(|n| fed.join(ConnectionId::new(n), Some(&format!("fed{n}")), "test").unwrap())
        .collect();
    fed.take_deliveries();
    (fed, handles)
}

fn ok(fed: &mut Fed, federate: FederateHandle, request: Req) -> ServiceResponse<Integer64Time> {
    fed.handle(federate, &request).unwrap()
}

fn err(fed: &mut Fed, federate: FederateHandle, request: Req) -> ErrorKind {
    fed.handle(federate, &request).unwrap_err().kind
}

/// Callbacks delivered to `federate` since the last drain, dropping the
/// rest.
fn drain(fed: &mut Fed, federate: FederateHandle) -> Vec<Cb> {
    fed.take_deliveries()
        .into_iter()
        .filter(|d| d.connection == ConnectionId::new(u64::from(federate.raw())))
        .map(|d| d.callback)
        .collect()
}

fn drain_all(fed: &mut Fed) -> Vec<Delivery<Integer64Time>> {
    fed.take_deliveries()
}

fn to(deliveries: &[Delivery<Integer64Time>], federate: FederateHandle) -> Vec<Cb> {
    deliveries
        .iter()
        .filter(|d| d.connection == ConnectionId::new(u64::from(federate.raw())))
        .map(|d| d.callback.clone())
        .collect()
}

fn t(value: i64) -> Integer64Time {
    Integer64Time::new(value).unwrap()
}

fn class(fed: &Fed, name: &str) -> ObjectClassHandle {
    fed.model().object_class_handle(name).unwrap()
}

fn attrs(fed: &Fed, class: ObjectClassHandle, names: &[&str]) -> AttributeHandleSet {
    names.iter().map(|n| fed.model().attribute_handle(class, n).unwrap()).collect()
}

fn values(fed: &Fed, class: ObjectClassHandle, names: &[&str]) -> AttributeValues {
    let mut values = AttributeValues::new();
    for name in names {
        values.add(fed.model().attribute_handle(class, name).unwrap(), name.as_bytes().to_vec()).unwrap();
    }
    values
}

fn publish(fed: &mut Fed, federate: FederateHandle, class: ObjectClassHandle, attributes: AttributeHandleSet) {
    ok(fed, federate, Req::PublishObjectClassAttributes { class, attributes });
}

fn subscribe(fed: &mut Fed, federate: FederateHandle, class: ObjectClassHandle, attributes: AttributeHandleSet) {
    ok(fed, federate, Req::SubscribeObjectClassAttributes {
        class,
        attributes,
        passive: false,
        regions: RegionHandleSet::new(),
    });
}

fn register(fed: &mut Fed, federate: FederateHandle, class: ObjectClassHandle) -> ObjectInstanceHandle {
    match ok(fed, federate, Req::RegisterObjectInstance { class, name: None, regions: Vec::new() }) {
        ServiceResponse::ObjectInstance(object) => object,
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn join_rejects_taken_names_and_generates_missing_ones() {
    let mut fed = federation();
    let first = fed.join(ConnectionId::new(1), Some("alpha"), "sim").unwrap();
    let err = fed.join(ConnectionId::new(2), Some("alpha"), "sim").unwrap_err();
    assert_eq!(err.kind, ErrorKind::FederateNameAlreadyInUse);

    let second = fed.join(ConnectionId::new(2), None, "sim").unwrap();
    let names: Vec<_> = fed.federates().map(|(h, n)| (h, n.to_string())).collect();
    assert_eq!(names, vec![(first, "alpha".to_string()), (second, format!("sim-{}", second.raw()))]);
    assert_eq!(fed.federate_of(ConnectionId::new(2)), Some(second));
}

#[test]
fn sync_point_reaches_late_joiners_and_reports_failures() {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::RegisterFederationSynchronizationPoint {
        label: "ready".into(),
        tag: Bytes::from_static(b"t"),
        federates: None,
    });
    let out = drain_all(&mut fed);
    assert!(to(&out, h[0]).contains(&Cb::SynchronizationPointRegistrationSucceeded { label: "ready".into() }));
    assert!(to(&out, h[1]).contains(&Cb::AnnounceSynchronizationPoint {
        label: "ready".into(),
        tag: Bytes::from_static(b"t")
    }));

    let late = fed.join(ConnectionId::new(3), Some("fed3"), "test").unwrap();
    assert_eq!(drain(&mut fed, late), vec![Cb::AnnounceSynchronizationPoint {
        label: "ready".into(),
        tag: Bytes::from_static(b"t")
    }]);

    ok(&mut fed, h[0], Req::SynchronizationPointAchieved { label: "ready".into(), successful: true });
    ok(&mut fed, h[1], Req::SynchronizationPointAchieved { label: "ready".into(), successful: false });
    assert!(drain_all(&mut fed).is_empty());

    ok(&mut fed, late, Req::SynchronizationPointAchieved { label: "ready".into(), successful: true });
    let out = drain_all(&mut fed);
    let failed: FederateHandleSet = [h[1]].into_iter().collect();
    for federate in [h[0], h[1], late] {
        assert_eq!(to(&out, federate), vec![Cb::FederationSynchronized {
            label: "ready".into(),
            failed: failed.clone()
        }]);
    }
    assert_eq!(
        err(&mut fed, h[0], Req::SynchronizationPointAchieved { label: "ready".into(), successful: true }),
        ErrorKind::SynchronizationPointLabelNotAnnounced
    );
}

#[test]
fn sync_point_registration_failures() {
    let (mut fed, h) = joined(2);
    let register = |federates| Req::RegisterFederationSynchronizationPoint {
        label: "p".into(),
        tag: Bytes::new(),
        federates,
    };

    let stranger: FederateHandleSet = [FederateHandle::from_raw(9)].into_iter().collect();
    ok(&mut fed, h[0], register(Some(stranger)));
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::SynchronizationPointRegistrationFailed {
        label: "p".into(),
        reason: SyncPointFailureReason::SynchronizationSetMemberNotJoined
    }]);

    ok(&mut fed, h[0], register(None));
    drain_all(&mut fed);
    ok(&mut fed, h[1], register(None));
    assert_eq!(drain(&mut fed, h[1]), vec![Cb::SynchronizationPointRegistrationFailed {
        label: "p".into(),
        reason: SyncPointFailureReason::LabelNotUnique
    }]);
}

#[test]
fn resigning_member_can_complete_a_sync_point() {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::RegisterFederationSynchronizationPoint {
        label: "p".into(),
        tag: Bytes::new(),
        federates: None,
    });
    ok(&mut fed, h[0], Req::SynchronizationPointAchieved { label: "p".into(), successful: true });
    drain_all(&mut fed);

    ok(&mut fed, h[1], Req::ResignFederationExecution { action: ResignAction::NoAction });
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::FederationSynchronized {
        label: "p".into(),
        failed: FederateHandleSet::new()
    }]);
}

#[test]
fn reflections_carry_only_subscribed_attributes() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position", "velocity"]);
    publish(&mut fed, h[0], vehicle, attributes);
    let attributes = attrs(&fed, vehicle, &["position"]);
    subscribe(&mut fed, h[1], vehicle, attributes);
    drain_all(&mut fed);

    let object = register(&mut fed, h[0], vehicle);
    assert_eq!(drain(&mut fed, h[1]), vec![Cb::DiscoverObjectInstance {
        object,
        class: vehicle,
        name: format!("HLAobject_{}", object.raw()),
        producer: h[0],
    }]);

    let update = values(&fed, vehicle, &["position", "velocity"]);
    let response =
        ok(&mut fed, h[0], Req::UpdateAttributeValues { object, values: update, tag: Bytes::new(), time: None });
    assert_eq!(response, ServiceResponse::Retraction(None));
    let reflected = drain(&mut fed, h[1]);
    let [Cb::ReflectAttributeValues { values, info, .. }] = reflected.as_slice() else {
        panic!("expected one reflection, got {reflected:?}");
    };
    assert_eq!(values.handles().collect::<AttributeHandleSet>(), attrs(&fed, vehicle, &["position"]));
    assert_eq!(info.producer, h[0]);
    assert_eq!(info.order, hla_proto::OrderType::Receive);
}

#[test]
fn subclass_instances_are_discovered_at_the_subscribed_superclass() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let car = class(&fed, "Car");
    let attributes = attrs(&fed, car, &["position", "doors"]);
    publish(&mut fed, h[0], car, attributes);
    let attributes = attrs(&fed, vehicle, &["position"]);
    subscribe(&mut fed, h[1], vehicle, attributes);
    let object = register(&mut fed, h[0], car);

    let discovered = drain(&mut fed, h[1]);
    assert!(matches!(
        discovered.as_slice(),
        [Cb::DiscoverObjectInstance { class, .. }] if *class == vehicle
    ));
    assert_eq!(
        ok(&mut fed, h[1], Req::GetKnownObjectClassHandle { object }),
        ServiceResponse::ObjectClass(vehicle)
    );
}

#[test]
fn late_subscription_discovers_existing_objects() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, attributes);
    let object = register(&mut fed, h[0], vehicle);
    drain_all(&mut fed);

    let attributes = attrs(&fed, vehicle, &["position"]);
    subscribe(&mut fed, h[1], vehicle, attributes);
    assert!(matches!(
        drain(&mut fed, h[1]).as_slice(),
        [Cb::DiscoverObjectInstance { object: o, .. }] if *o == object
    ));
}

#[test]
fn name_reservation_rules() {
    let (mut fed, h) = joined(2);
    assert_eq!(err(&mut fed, h[0], Req::ReserveObjectInstanceName { name: "HLAcar".into() }), ErrorKind::IllegalName);

    ok(&mut fed, h[0], Req::ReserveObjectInstanceName { name: "car".into() });
    ok(&mut fed, h[1], Req::ReserveObjectInstanceName { name: "car".into() });
    let out = drain_all(&mut fed);
    assert_eq!(to(&out, h[0]), vec![Cb::ObjectInstanceNameReservationSucceeded { name: "car".into() }]);
    assert_eq!(to(&out, h[1]), vec![Cb::ObjectInstanceNameReservationFailed { name: "car".into() }]);

    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[1], vehicle, attributes);
    assert_eq!(
        err(&mut fed, h[1], Req::RegisterObjectInstance {
            class: vehicle,
            name: Some("car".into()),
            regions: Vec::new()
        }),
        ErrorKind::ObjectInstanceNameNotReserved
    );
}

#[test]
fn rti_owned_attributes_cannot_be_published() {
    let (mut fed, h) = joined(1);
    let car = class(&fed, "Car");
    let attributes = attrs(&fed, car, &["registry"]);
    assert_eq!(
        err(&mut fed, h[0], Req::PublishObjectClassAttributes {
            class: car,
            attributes
        }),
        ErrorKind::AttributeNotDefined
    );

    let attributes = attrs(&fed, car, &["doors"]);
    publish(&mut fed, h[0], car, attributes);
    let object = register(&mut fed, h[0], car);
    let registry = fed.model().attribute_handle(car, "registry").unwrap();
    let doors = fed.model().attribute_handle(car, "doors").unwrap();
    let position = fed.model().attribute_handle(car, "position").unwrap();
    assert_eq!(fed.owner(object, registry), Some(Owner::Rti));
    assert_eq!(fed.owner(object, doors), Some(Owner::Federate(h[0])));
    assert_eq!(fed.owner(object, position), Some(Owner::Unowned));
}

#[test]
fn interactions_arrive_as_the_nearest_subscribed_class() {
    let (mut fed, h) = joined(2);
    let collision = fed.model().interaction_class_handle("Collision").unwrap();
    let crash = fed.model().interaction_class_handle("Crash").unwrap();
    ok(&mut fed, h[0], Req::PublishInteractionClass { class: crash });
    ok(&mut fed, h[1], Req::SubscribeInteractionClass {
        class: collision,
        passive: false,
        regions: RegionHandleSet::new(),
    });

    let mut parameters = ParameterValues::new();
    parameters.add(fed.model().parameter_handle(crash, "severity").unwrap(), vec![3]).unwrap();
    parameters.add(fed.model().parameter_handle(crash, "injuries").unwrap(), vec![1]).unwrap();
    drain_all(&mut fed);
    ok(&mut fed, h[0], Req::SendInteraction {
        class: crash,
        parameters,
        tag: Bytes::new(),
        time: None,
        regions: RegionHandleSet::new(),
    });

    let received = drain(&mut fed, h[1]);
    let [Cb::ReceiveInteraction { class, parameters, .. }] = received.as_slice() else {
        panic!("expected one interaction, got {received:?}");
    };
    assert_eq!(*class, collision);
    assert_eq!(parameters.len(), 1);
}

#[test]
fn negotiated_divestiture_completes_on_acquisition() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let position = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, position.clone());
    publish(&mut fed, h[1], vehicle, position.clone());
    subscribe(&mut fed, h[1], vehicle, position.clone());
    let object = register(&mut fed, h[0], vehicle);
    drain_all(&mut fed);

    ok(&mut fed, h[0], Req::NegotiatedAttributeOwnershipDivestiture {
        object,
        attributes: position.clone(),
        tag: Bytes::from_static(b"take it"),
    });
    assert_eq!(drain(&mut fed, h[1]), vec![Cb::RequestAttributeOwnershipAssumption {
        object,
        attributes: position.clone(),
        tag: Bytes::from_static(b"take it")
    }]);
    assert_eq!(
        err(&mut fed, h[0], Req::NegotiatedAttributeOwnershipDivestiture {
            object,
            attributes: position.clone(),
            tag: Bytes::new()
        }),
        ErrorKind::AttributeAlreadyBeingDivested
    );

    ok(&mut fed, h[1], Req::AttributeOwnershipAcquisition {
        object,
        attributes: position.clone(),
        tag: Bytes::new(),
    });
    let out = drain_all(&mut fed);
    assert!(to(&out, h[0]).contains(&Cb::AttributeOwnershipDivestitureNotification {
        object,
        attributes: position.clone()
    }));
    assert!(to(&out, h[1]).contains(&Cb::AttributeOwnershipAcquisitionNotification {
        object,
        attributes: position.clone(),
        tag: Bytes::new()
    }));
    let attribute = position.iter().next().unwrap();
    assert_eq!(fed.owner(object, attribute), Some(Owner::Federate(h[1])));
}

#[test]
fn acquisition_from_an_owner_waits_for_release() {
    let (mut fed, h) = joined(3);
    let vehicle = class(&fed, "Vehicle");
    let position = attrs(&fed, vehicle, &["position"]);
    for federate in &h {
        publish(&mut fed, *federate, vehicle, position.clone());
        subscribe(&mut fed, *federate, vehicle, position.clone());
    }
    let object = register(&mut fed, h[0], vehicle);
    drain_all(&mut fed);

    ok(&mut fed, h[1], Req::AttributeOwnershipAcquisition { object, attributes: position.clone(), tag: Bytes::new() });
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::RequestAttributeOwnershipRelease {
        object,
        attributes: position.clone(),
        tag: Bytes::new()
    }]);

    ok(&mut fed, h[2], Req::AttributeOwnershipAcquisitionIfAvailable { object, attributes: position.clone() });
    assert_eq!(drain(&mut fed, h[2]), vec![Cb::AttributeOwnershipUnavailable {
        object,
        attributes: position.clone()
    }]);

    let released = ok(&mut fed, h[0], Req::AttributeOwnershipReleaseResponse { object, attributes: position.clone() });
    assert_eq!(released, ServiceResponse::Attributes(position.clone()));
    assert!(drain(&mut fed, h[1]).contains(&Cb::AttributeOwnershipAcquisitionNotification {
        object,
        attributes: position.clone(),
        tag: Bytes::new()
    }));
}

#[test]
fn release_denied_reports_unavailable_to_the_acquirer() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let position = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, position.clone());
    publish(&mut fed, h[1], vehicle, position.clone());
    subscribe(&mut fed, h[1], vehicle, position.clone());
    let object = register(&mut fed, h[0], vehicle);
    ok(&mut fed, h[1], Req::AttributeOwnershipAcquisition { object, attributes: position.clone(), tag: Bytes::new() });
    drain_all(&mut fed);

    ok(&mut fed, h[0], Req::AttributeOwnershipReleaseDenied { object, attributes: position.clone() });
    assert_eq!(drain(&mut fed, h[1]), vec![Cb::AttributeOwnershipUnavailable { object, attributes: position.clone() }]);
    assert_eq!(
        err(&mut fed, h[1], Req::CancelAttributeOwnershipAcquisition { object, attributes: position }),
        ErrorKind::AttributeAcquisitionWasNotRequested
    );
}

#[test]
fn ownership_queries_name_the_owner() {
    let (mut fed, h) = joined(2);
    let car = class(&fed, "Car");
    let attributes = attrs(&fed, car, &["doors"]);
    publish(&mut fed, h[0], car, attributes);
    let attributes = attrs(&fed, car, &["doors"]);
    subscribe(&mut fed, h[1], car, attributes);
    let object = register(&mut fed, h[0], car);
    drain_all(&mut fed);

    let doors = fed.model().attribute_handle(car, "doors").unwrap();
    let registry = fed.model().attribute_handle(car, "registry").unwrap();
    let position = fed.model().attribute_handle(car, "position").unwrap();
    for attribute in [doors, registry, position] {
        ok(&mut fed, h[1], Req::QueryAttributeOwnership { object, attribute });
    }
    assert_eq!(drain(&mut fed, h[1]), vec![
        Cb::InformAttributeOwnership { object, attribute: doors, owner: h[0] },
        Cb::AttributeIsOwnedByRti { object, attribute: registry },
        Cb::AttributeIsNotOwned { object, attribute: position },
    ]);
}

#[test]
fn resign_respects_the_action() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let position = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, position.clone());
    subscribe(&mut fed, h[1], vehicle, position);
    let object = register(&mut fed, h[0], vehicle);
    drain_all(&mut fed);

    assert_eq!(
        err(&mut fed, h[0], Req::ResignFederationExecution { action: ResignAction::NoAction }),
        ErrorKind::FederateOwnsAttributes
    );
    ok(&mut fed, h[0], Req::ResignFederationExecution { action: ResignAction::DeleteObjects });
    assert!(matches!(
        drain(&mut fed, h[1]).as_slice(),
        [Cb::RemoveObjectInstance { object: o, .. }] if *o == object
    ));
    assert_eq!(fed.federate_count(), 1);
    assert_eq!(fed.objects().count(), 0);
}

#[test]
fn registration_advice_follows_remote_subscriptions() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let car = class(&fed, "Car");
    let attributes = attrs(&fed, car, &["doors"]);
    publish(&mut fed, h[0], car, attributes);
    assert!(drain(&mut fed, h[0]).is_empty());

    let attributes = attrs(&fed, vehicle, &["position"]);
    subscribe(&mut fed, h[1], vehicle, attributes);
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::StartRegistrationForObjectClass { class: car }]);

    ok(&mut fed, h[1], Req::UnsubscribeObjectClass { class: vehicle });
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::StopRegistrationForObjectClass { class: car }]);
}

#[test]
fn passive_subscriptions_give_no_advice() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, attributes);
    let attributes = attrs(&fed, vehicle, &["position"]);
    ok(&mut fed, h[1], Req::SubscribeObjectClassAttributes {
        class: vehicle,
        attributes,
        passive: true,
        regions: RegionHandleSet::new(),
    });
    assert!(drain(&mut fed, h[0]).is_empty());
}

#[test]
fn redundant_advisory_switch_is_rejected() {
    let (mut fed, h) = joined(1);
    assert_eq!(
        err(&mut fed, h[0], Req::SetAdvisorySwitch {
            switch: AdvisorySwitches::OBJECT_CLASS_RELEVANCE,
            enabled: true
        }),
        ErrorKind::ObjectClassRelevanceAdvisorySwitchIsOn
    );
    ok(&mut fed, h[0], Req::SetAdvisorySwitch { switch: AdvisorySwitches::OBJECT_CLASS_RELEVANCE, enabled: false });
}

fn regulating_and_constrained() -> (Fed, FederateHandle, FederateHandle) {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::EnableTimeRegulation { lookahead: Integer64Interval::new(1).unwrap() });
    ok(&mut fed, h[1], Req::EnableTimeConstrained);
    drain_all(&mut fed);
    (fed, h[0], h[1])
}

fn send_crash(fed: &mut Fed, from: FederateHandle, time: i64) -> Option<MessageRetractionHandle> {
    let crash = fed.model().interaction_class_handle("Crash").unwrap();
    match ok(fed, from, Req::SendInteraction {
        class: crash,
        parameters: ParameterValues::new(),
        tag: Bytes::new(),
        time: Some(t(time)),
        regions: RegionHandleSet::new(),
    }) {
        ServiceResponse::Retraction(handle) => handle,
        other => panic!("unexpected {other:?}"),
    }
}

fn crash_pubsub(fed: &mut Fed, from: FederateHandle, to: FederateHandle) {
    let crash = fed.model().interaction_class_handle("Crash").unwrap();
    ok(fed, from, Req::PublishInteractionClass { class: crash });
    ok(fed, to, Req::SubscribeInteractionClass { class: crash, passive: false, regions: RegionHandleSet::new() });
    drain_all(fed);
}

#[test]
fn constrained_federate_waits_for_the_regulator() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    crash_pubsub(&mut fed, regulator, constrained);
    assert!(send_crash(&mut fed, regulator, 5).is_some());
    assert!(drain(&mut fed, constrained).is_empty());

    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    assert!(drain(&mut fed, constrained).is_empty());
    assert_eq!(fed.galt(constrained), Some(t(1)));

    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    let out = drain_all(&mut fed);
    assert_eq!(to(&out, regulator), vec![Cb::TimeAdvanceGrant { time: t(10) }]);
    let delivered = to(&out, constrained);
    assert!(matches!(delivered.as_slice(), [
        Cb::ReceiveInteraction { info, .. },
        Cb::TimeAdvanceGrant { time }
    ] if info.time == Some(t(5)) && *time == t(10)));
    assert_eq!(fed.logical_time(constrained), Some(t(10)));
}

#[test]
fn next_message_request_stops_at_the_first_message() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    crash_pubsub(&mut fed, regulator, constrained);
    send_crash(&mut fed, regulator, 4);
    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(20) });
    drain_all(&mut fed);

    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::NextMessage, time: t(10) });
    let delivered = drain(&mut fed, constrained);
    assert!(matches!(delivered.last(), Some(Cb::TimeAdvanceGrant { time }) if *time == t(4)));
    assert_eq!(delivered.len(), 2);
}

#[test]
fn sending_before_the_lookahead_is_rejected() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    crash_pubsub(&mut fed, regulator, constrained);
    let crash = fed.model().interaction_class_handle("Crash").unwrap();
    assert_eq!(
        err(&mut fed, regulator, Req::SendInteraction {
            class: crash,
            parameters: ParameterValues::new(),
            tag: Bytes::new(),
            time: Some(t(0)),
            regions: RegionHandleSet::new(),
        }),
        ErrorKind::InvalidLogicalTime
    );
}

#[test]
fn retracted_messages_never_arrive() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    crash_pubsub(&mut fed, regulator, constrained);
    let handle = send_crash(&mut fed, regulator, 5).unwrap();
    ok(&mut fed, regulator, Req::Retract { handle });
    assert_eq!(err(&mut fed, regulator, Req::Retract { handle }), ErrorKind::InvalidMessageRetractionHandle);

    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    assert_eq!(drain(&mut fed, constrained), vec![Cb::TimeAdvanceGrant { time: t(10) }]);
}

#[test]
fn grants_drop_retraction_records_the_sender_can_no_longer_use() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    crash_pubsub(&mut fed, regulator, constrained);
    let early = send_crash(&mut fed, regulator, 5).unwrap();
    let late = send_crash(&mut fed, regulator, 15).unwrap();
    assert_eq!(fed.sent.len(), 2);

    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    assert!(!fed.sent.contains_key(&early));
    assert!(fed.sent.contains_key(&late));
    assert_eq!(err(&mut fed, regulator, Req::Retract { handle: early }), ErrorKind::MessageCanNoLongerBeRetracted);

    ok(&mut fed, regulator, Req::Retract { handle: late });
    assert_eq!(err(&mut fed, regulator, Req::Retract { handle: late }), ErrorKind::InvalidMessageRetractionHandle);
    ok(&mut fed, regulator, Req::ResignFederationExecution { action: ResignAction::NoAction });
    assert!(fed.sent.is_empty());
}

#[test]
fn messages_to_unconstrained_federates_arrive_in_receive_order() {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::EnableTimeRegulation { lookahead: Integer64Interval::new(1).unwrap() });
    crash_pubsub(&mut fed, h[0], h[1]);
    send_crash(&mut fed, h[0], 7);

    let delivered = drain(&mut fed, h[1]);
    assert!(matches!(delivered.as_slice(), [Cb::ReceiveInteraction { info, .. }]
        if info.order == hla_proto::OrderType::Receive && info.retraction.is_none()));
}

#[test]
fn disjoint_regions_filter_reflections() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let x = fed.model().dimension_handle("x").unwrap();
    let dims: DimensionHandleSet = [x].into_iter().collect();
    let mut region_of = |federate, lower, upper| {
        let ServiceResponse::Region(region) =
            ok(&mut fed, federate, Req::CreateRegion { dimensions: dims.clone() })
        else {
            panic!("expected a region");
        };
        ok(&mut fed, federate, Req::CommitRegionModifications {
            regions: vec![RegionExtents { region, bounds: vec![(x, RangeBounds::new(lower, upper).unwrap())] }],
        });
        region
    };
    let near = region_of(h[0], 0, 10);
    let far = region_of(h[1], 50, 60);

    let position = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[0], vehicle, position.clone());
    ok(&mut fed, h[1], Req::SubscribeObjectClassAttributes {
        class: vehicle,
        attributes: position.clone(),
        passive: false,
        regions: [far].into_iter().collect(),
    });
    let object = match ok(&mut fed, h[0], Req::RegisterObjectInstance {
        class: vehicle,
        name: None,
        regions: vec![AttributeRegions { attributes: position, regions: [near].into_iter().collect() }],
    }) {
        ServiceResponse::ObjectInstance(object) => object,
        other => panic!("unexpected {other:?}"),
    };
    drain_all(&mut fed);

    let values = values(&fed, vehicle, &["position"]);
    ok(&mut fed, h[0], Req::UpdateAttributeValues {
        object,
        values,
        tag: Bytes::new(),
        time: None,
    });
    assert!(!drain(&mut fed, h[1]).iter().any(|c| matches!(c, Cb::ReflectAttributeValues { .. })));

    assert_eq!(
        err(&mut fed, h[0], Req::DeleteRegion { region: near }),
        ErrorKind::RegionInUseForUpdateOrSubscription
    );
    assert_eq!(
        err(&mut fed, h[0], Req::DeleteRegion { region: far }),
        ErrorKind::RegionNotCreatedByThisFederate
    );
}

#[test]
fn out_of_range_bounds_are_rejected() {
    let (mut fed, h) = joined(1);
    let x = fed.model().dimension_handle("x").unwrap();
    let ServiceResponse::Region(region) =
        ok(&mut fed, h[0], Req::CreateRegion { dimensions: [x].into_iter().collect() })
    else {
        panic!("expected a region");
    };
    assert_eq!(
        err(&mut fed, h[0], Req::CommitRegionModifications {
            regions: vec![RegionExtents { region, bounds: vec![(x, RangeBounds::new(0, 101).unwrap())] }],
        }),
        ErrorKind::InvalidRangeBound
    );
}

fn save(fed: &mut Fed, federates: &[FederateHandle], label: &str) {
    ok(fed, federates[0], Req::RequestFederationSave { label: label.into(), time: None });
    save_reports(fed, federates);
}

fn save_reports(fed: &mut Fed, federates: &[FederateHandle]) {
    for federate in federates {
        ok(fed, *federate, Req::FederateSaveBegun);
        ok(fed, *federate, Req::FederateSaveComplete);
    }
}

#[test]
fn save_walks_every_federate_through_its_statuses() {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::RequestFederationSave { label: "s1".into(), time: None });
    let out = drain_all(&mut fed);
    for federate in &h {
        assert_eq!(to(&out, *federate), vec![Cb::InitiateFederateSave { label: "s1".into(), time: None }]);
    }
    assert_eq!(err(&mut fed, h[0], Req::FederateSaveComplete), ErrorKind::FederateHasNotBegunSave);
    assert_eq!(err(&mut fed, h[0], Req::EnableTimeConstrained), ErrorKind::SaveInProgress);

    ok(&mut fed, h[0], Req::FederateSaveBegun);
    ok(&mut fed, h[0], Req::QueryFederationSaveStatus);
    assert!(matches!(
        drain(&mut fed, h[0]).as_slice(),
        [Cb::FederationSaveStatusResponse { statuses }]
            if statuses[0].status == SaveStatus::FederateSaving
                && statuses[1].status == SaveStatus::FederateInstructedToSave
    ));

    ok(&mut fed, h[0], Req::FederateSaveComplete);
    ok(&mut fed, h[1], Req::FederateSaveBegun);
    ok(&mut fed, h[1], Req::FederateSaveComplete);
    let out = drain_all(&mut fed);
    assert_eq!(to(&out, h[0]), vec![Cb::FederationSaved]);
    assert_eq!(to(&out, h[1]), vec![Cb::FederationSaved]);
    assert_eq!(fed.saved_labels().collect::<Vec<_>>(), vec!["s1"]);
}

#[test]
fn failed_or_abandoned_saves_are_reported() {
    let (mut fed, h) = joined(2);
    ok(&mut fed, h[0], Req::RequestFederationSave { label: "s".into(), time: None });
    ok(&mut fed, h[0], Req::FederateSaveBegun);
    ok(&mut fed, h[0], Req::FederateSaveNotComplete);
    ok(&mut fed, h[1], Req::FederateSaveBegun);
    ok(&mut fed, h[1], Req::FederateSaveComplete);
    assert_eq!(drain(&mut fed, h[1]).last(), Some(&Cb::FederationNotSaved {
        reason: SaveFailureReason::FederateReportedFailure
    }));

    ok(&mut fed, h[0], Req::RequestFederationSave { label: "s".into(), time: None });
    ok(&mut fed, h[1], Req::ResignFederationExecution { action: ResignAction::NoAction });
    assert_eq!(drain(&mut fed, h[0]).last(), Some(&Cb::FederationNotSaved {
        reason: SaveFailureReason::FederateResigned
    }));
    assert!(!fed.in_save_or_restore());
    assert_eq!(err(&mut fed, h[0], Req::AbortFederationSave), ErrorKind::SaveNotInProgress);
}

#[test]
fn timed_save_waits_for_constrained_federates() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    ok(&mut fed, regulator, Req::RequestFederationSave { label: "later".into(), time: Some(t(5)) });
    assert!(drain_all(&mut fed).is_empty());

    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(5) });
    let out = drain(&mut fed, constrained);
    assert_eq!(out.last(), Some(&Cb::InitiateFederateSave { label: "later".into(), time: Some(t(5)) }));
}

#[test]
fn newer_save_request_replaces_a_pending_timed_save() {
    let (mut fed, regulator, constrained) = regulating_and_constrained();
    ok(&mut fed, regulator, Req::RequestFederationSave { label: "s1".into(), time: Some(t(5)) });
    ok(&mut fed, constrained, Req::RequestFederationSave { label: "s2".into(), time: Some(t(7)) });

    ok(&mut fed, regulator, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) });
    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(6) });
    let out = drain_all(&mut fed);
    assert!(!out.iter().any(|d| matches!(d.callback, Cb::InitiateFederateSave { .. })));

    ok(&mut fed, regulator, Req::RequestFederationSave { label: "s3".into(), time: None });
    let out = drain_all(&mut fed);
    for federate in [regulator, constrained] {
        assert_eq!(to(&out, federate), vec![Cb::InitiateFederateSave { label: "s3".into(), time: None }]);
    }
    save_reports(&mut fed, &[regulator, constrained]);
    drain_all(&mut fed);

    ok(&mut fed, constrained, Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(8) });
    assert_eq!(drain(&mut fed, constrained), vec![Cb::TimeAdvanceGrant { time: t(8) }]);
    assert!(!fed.in_save_or_restore());
    assert_eq!(fed.saved_labels().collect::<Vec<_>>(), vec!["s3"]);
}

#[test]
fn restore_returns_the_saved_state_and_handles() {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[1], vehicle, attributes);
    save(&mut fed, &h, "s1");
    register(&mut fed, h[1], vehicle);

    // Rejoin fed1 under a new handle: the restore must hand the saved one back.
    ok(&mut fed, h[0], Req::ResignFederationExecution { action: ResignAction::DeleteObjects });
    let rejoined = fed.join(ConnectionId::new(1), Some("fed1"), "test").unwrap();
    assert_ne!(rejoined, h[0]);
    assert_eq!(fed.objects().count(), 1);
    drain_all(&mut fed);

    ok(&mut fed, h[1], Req::RequestFederationRestore { label: "s1".into() });
    let out = drain_all(&mut fed);
    assert_eq!(to(&out, h[1])[0], Cb::RequestFederationRestoreSucceeded { label: "s1".into() });
    assert!(to(&out, h[0]).contains(&Cb::InitiateFederateRestore {
        label: "s1".into(),
        federate_name: "fed1".into(),
        federate: h[0],
    }));

    ok(&mut fed, h[0], Req::QueryFederationRestoreStatus);
    let statuses = drain(&mut fed, h[0]);
    assert!(matches!(
        statuses.as_slice(),
        [Cb::FederationRestoreStatusResponse { statuses }]
            if statuses.iter().any(|s| s.pre_restore == rejoined
                && s.post_restore == h[0]
                && s.status == RestoreStatus::FederateRestoreRequestPending)
    ));

    ok(&mut fed, h[0], Req::FederateRestoreComplete);
    ok(&mut fed, h[1], Req::FederateRestoreComplete);
    let out = drain_all(&mut fed);
    assert_eq!(to(&out, h[0]), vec![Cb::FederationRestored]);
    assert_eq!(fed.objects().count(), 0);
    assert_eq!(fed.federate_of(ConnectionId::new(1)), Some(h[0]));
}

/// Save with `fed1` and `fed2`, then rejoin `fed1` under a new handle and
/// request a restore. Returns the saved handles and `fed1`'s new one.
fn restoring_a_rejoined_federate() -> (Fed, Vec<FederateHandle>, FederateHandle) {
    let (mut fed, h) = joined(2);
    let vehicle = class(&fed, "Vehicle");
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, h[1], vehicle, attributes);
    save(&mut fed, &h, "s1");
    ok(&mut fed, h[0], Req::ResignFederationExecution { action: ResignAction::NoAction });
    let rejoined = fed.join(ConnectionId::new(1), Some("fed1"), "test").unwrap();
    let attributes = attrs(&fed, vehicle, &["position"]);
    publish(&mut fed, rejoined, vehicle, attributes);
    register(&mut fed, rejoined, vehicle);
    ok(&mut fed, h[1], Req::RequestFederationRestore { label: "s1".into() });
    drain_all(&mut fed);
    assert_eq!(fed.federate_of(ConnectionId::new(1)), Some(h[0]));
    assert_eq!(fed.objects().count(), 1);
    (fed, h, rejoined)
}

#[test]
fn aborted_restore_gives_back_the_pre_restore_handles() {
    let (mut fed, h, rejoined) = restoring_a_rejoined_federate();
    ok(&mut fed, h[1], Req::AbortFederationRestore);
    assert_eq!(to(&drain_all(&mut fed), h[1]), vec![Cb::FederationNotRestored {
        reason: RestoreFailureReason::RestoreAborted
    }]);

    assert_eq!(fed.federate_of(ConnectionId::new(1)), Some(rejoined));
    assert_eq!(err(&mut fed, h[0], Req::QueryFederationRestoreStatus), ErrorKind::FederateNotExecutionMember);
    let vehicle = class(&fed, "Vehicle");
    let position = fed.model().attribute_handle(vehicle, "position").unwrap();
    let (object, _) = fed.objects().next().unwrap();
    assert_eq!(fed.owner(object, position), Some(Owner::Federate(rejoined)));
    ok(&mut fed, rejoined, Req::EnableTimeConstrained);
}

#[test]
fn failed_restore_gives_back_the_pre_restore_handles() {
    let (mut fed, h, rejoined) = restoring_a_rejoined_federate();
    ok(&mut fed, h[0], Req::FederateRestoreNotComplete);
    ok(&mut fed, h[1], Req::FederateRestoreComplete);
    assert_eq!(to(&drain_all(&mut fed), h[1]), vec![Cb::FederationNotRestored {
        reason: RestoreFailureReason::FederateReportedFailure
    }]);
    assert_eq!(fed.federate_of(ConnectionId::new(1)), Some(rejoined));
    assert_eq!(fed.federate_of(ConnectionId::new(2)), Some(h[1]));
}

#[test]
fn resigning_mid_restore_leaves_the_others_on_their_old_handles() {
    let (mut fed, h, _) = restoring_a_rejoined_federate();
    ok(&mut fed, h[0], Req::ResignFederationExecution { action: ResignAction::DeleteObjects });
    assert_eq!(drain(&mut fed, h[1]).last(), Some(&Cb::FederationNotRestored {
        reason: RestoreFailureReason::FederateResigned
    }));
    assert!(!fed.in_save_or_restore());
    assert_eq!(fed.federate_of(ConnectionId::new(1)), None);
    assert_eq!(fed.federate_of(ConnectionId::new(2)), Some(h[1]));
    assert_eq!(fed.federates().count(), 1);
    assert_eq!(fed.objects().count(), 0);
}

#[test]
fn restore_of_an_unknown_label_fails() {
    let (mut fed, h) = joined(1);
    ok(&mut fed, h[0], Req::RequestFederationRestore { label: "nope".into() });
    assert_eq!(drain(&mut fed, h[0]), vec![Cb::RequestFederationRestoreFailed { label: "nope".into() }]);
    assert_eq!(err(&mut fed, h[0], Req::AbortFederationRestore), ErrorKind::RestoreNotInProgress);
}
