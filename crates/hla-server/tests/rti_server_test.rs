//! RTI server tests over raw service requests.

use bytes::Bytes;
use hla_core::RtiConnection;
use hla_proto::{
    AdvanceKind, AttributeHandleSet, AttributeValues, Callback, CallbackModel, ErrorKind,
    FomModule, Integer64Interval, Integer64Time, ObjectClassHandle, OrderType, RtiError,
    ServiceRequest, ServiceResponse,
};
use hla_server::{ConnectionId, LocalConnection, LocalRti, RtiConfig, RtiServer};
use proptest::prelude::*;

type Req = ServiceRequest<Integer64Time>;
type Resp = ServiceResponse<Integer64Time>;
type Cb = Callback<Integer64Time>;

fn fom() -> FomModule {
    FomModule::new("traffic")
        .object_class("Vehicle", None, &["position", "speed"])
        .interaction_class("Honk", None, &["volume"])
}

fn t(value: i64) -> Integer64Time {
    Integer64Time::new(value).unwrap()
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn join(server: &mut RtiServer<Integer64Time>, name: &str) -> ConnectionId {
    init_logging();
    let id = server.open();
    server.handle(id, &Req::Connect { callback_model: CallbackModel::Evoked }).unwrap();
    if server.federation("traffic").is_none() {
        server
            .handle(id, &Req::CreateFederationExecution { federation: "traffic".into(), modules: vec![fom()] })
            .unwrap();
    }
    server
        .handle(
            id,
            &Req::JoinFederationExecution {
                federate_name: Some(name.into()),
                federate_type: "car".into(),
                federation: "traffic".into(),
            },
        )
        .unwrap();
    id
}

fn drain(server: &mut RtiServer<Integer64Time>, id: ConnectionId) -> Vec<Cb> {
    std::iter::from_fn(|| server.next_callback(id)).collect()
}

fn vehicle(server: &mut RtiServer<Integer64Time>, id: ConnectionId) -> (ObjectClassHandle, AttributeHandleSet) {
    let Resp::ObjectClass(class) = server.handle(id, &Req::GetObjectClassHandle { name: "Vehicle".into() }).unwrap()
    else {
        panic!("expected a class handle");
    };
    let attributes = ["position", "speed"]
        .into_iter()
        .map(|name| {
            match server.handle(id, &Req::GetAttributeHandle { class, name: name.into() }).unwrap() {
                Resp::Attribute(attribute) => attribute,
                other => panic!("unexpected {other:?}"),
            }
        })
        .collect();
    (class, attributes)
}

#[test]
fn update_reaches_subscriber_only() {
    let mut server = RtiServer::new(RtiConfig::default());
    let producer = join(&mut server, "producer");
    let consumer = join(&mut server, "consumer");
    let bystander = join(&mut server, "bystander");
    let (class, attributes) = vehicle(&mut server, producer);

    server.handle(producer, &Req::PublishObjectClassAttributes { class, attributes: attributes.clone() }).unwrap();
    server
        .handle(
            consumer,
            &Req::SubscribeObjectClassAttributes {
                class,
                attributes: attributes.clone(),
                passive: false,
                regions: hla_proto::RegionHandleSet::new(),
            },
        )
        .unwrap();
    server.handle(producer, &Req::ReserveObjectInstanceName { name: "bus".into() }).unwrap();
    drain(&mut server, producer);
    let Resp::ObjectInstance(object) = server
        .handle(producer, &Req::RegisterObjectInstance { class, name: Some("bus".into()), regions: Vec::new() })
        .unwrap()
    else {
        panic!("expected an object handle");
    };

    let mut values = AttributeValues::new();
    for attribute in &attributes {
        values.add(attribute, Bytes::from_static(b"\x01")).unwrap();
    }
    server
        .handle(producer, &Req::UpdateAttributeValues { object, values, tag: Bytes::from_static(b"t"), time: None })
        .unwrap();

    let received = drain(&mut server, consumer);
    assert!(matches!(
        received.as_slice(),
        [Cb::DiscoverObjectInstance { name, .. }, Cb::ReflectAttributeValues { values, .. }]
            if name == "bus" && values.len() == 2
    ));
    assert!(drain(&mut server, bystander).is_empty());
}

#[test]
fn constrained_federate_waits_for_regulator() {
    let mut server = RtiServer::new(RtiConfig::default());
    let regulator = join(&mut server, "regulator");
    let follower = join(&mut server, "follower");

    server
        .handle(regulator, &Req::EnableTimeRegulation { lookahead: Integer64Interval::new(5).unwrap() })
        .unwrap();
    server.handle(follower, &Req::EnableTimeConstrained).unwrap();
    drain(&mut server, regulator);
    drain(&mut server, follower);

    server.handle(follower, &Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(4) }).unwrap();
    assert_eq!(drain(&mut server, follower), [Cb::TimeAdvanceGrant { time: t(4) }]);

    server.handle(follower, &Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) }).unwrap();
    assert!(drain(&mut server, follower).is_empty());
    assert_eq!(server.handle(follower, &Req::QueryGalt).unwrap(), Resp::Time(Some(t(5))));

    server.handle(regulator, &Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(6) }).unwrap();
    assert_eq!(drain(&mut server, regulator), [Cb::TimeAdvanceGrant { time: t(6) }]);
    assert_eq!(drain(&mut server, follower), [Cb::TimeAdvanceGrant { time: t(10) }]);
}

#[test]
fn timestamped_interaction_waits_for_the_grant() {
    let mut server = RtiServer::new(RtiConfig::default());
    let sender = join(&mut server, "sender");
    let receiver = join(&mut server, "receiver");
    let Resp::InteractionClass(honk) =
        server.handle(sender, &Req::GetInteractionClassHandle { name: "Honk".into() }).unwrap()
    else {
        panic!("expected an interaction class");
    };

    server.handle(sender, &Req::EnableTimeRegulation { lookahead: Integer64Interval::new(1).unwrap() }).unwrap();
    server.handle(sender, &Req::PublishInteractionClass { class: honk }).unwrap();
    server.handle(receiver, &Req::EnableTimeConstrained).unwrap();
    server
        .handle(
            receiver,
            &Req::SubscribeInteractionClass { class: honk, passive: false, regions: hla_proto::RegionHandleSet::new() },
        )
        .unwrap();
    drain(&mut server, sender);
    drain(&mut server, receiver);

    let sent = server
        .handle(
            sender,
            &Req::SendInteraction {
                class: honk,
                parameters: hla_proto::ParameterValues::new(),
                tag: Bytes::new(),
                time: Some(t(3)),
                regions: hla_proto::RegionHandleSet::new(),
            },
        )
        .unwrap();
    assert!(matches!(sent, Resp::Retraction(Some(_))));
    assert!(drain(&mut server, receiver).is_empty());

    server.handle(sender, &Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(10) }).unwrap();
    server.handle(receiver, &Req::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: t(5) }).unwrap();

    let received = drain(&mut server, receiver);
    assert!(matches!(
        received.as_slice(),
        [Cb::ReceiveInteraction { info, .. }, Cb::TimeAdvanceGrant { time }]
            if info.order == OrderType::Timestamp && info.time == Some(t(3)) && *time == t(5)
    ));
}

fn local(rti: &LocalRti<Integer64Time>) -> LocalConnection<Integer64Time> {
    let connection = rti.connect().unwrap();
    connection.call(&Req::Connect { callback_model: CallbackModel::Evoked }).unwrap();
    connection
}

#[test]
fn local_connections_share_one_rti() {
    let rti = LocalRti::new(RtiConfig::default());
    let first = local(&rti);
    let second = local(&rti);

    first
        .call(&Req::CreateFederationExecution { federation: "traffic".into(), modules: vec![fom()] })
        .unwrap();
    let err: RtiError = second
        .call(&Req::CreateFederationExecution { federation: "traffic".into(), modules: vec![fom()] })
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FederationExecutionAlreadyExists);

    second.call(&Req::ListFederationExecutions).unwrap();
    let report = second.poll_callback(std::time::Duration::from_millis(100)).unwrap();
    assert!(matches!(report, Some(Cb::ReportFederationExecutions { executions }) if executions.len() == 1));
    assert_eq!(first.poll_callback(std::time::Duration::ZERO).unwrap(), None);
}

#[test]
fn unencoded_connections_behave_the_same() {
    let rti = LocalRti::new(RtiConfig { encode_messages: false, ..RtiConfig::default() });
    let connection = local(&rti);

    connection
        .call(&Req::CreateFederationExecution { federation: "traffic".into(), modules: vec![fom()] })
        .unwrap();
    let joined = connection
        .call(&Req::JoinFederationExecution {
            federate_name: None,
            federate_type: "car".into(),
            federation: "traffic".into(),
        })
        .unwrap();

    let Resp::Federate(handle) = joined else { panic!("expected a federate handle") };
    let name = rti
        .with_federation("traffic", |f| f.federates().map(|(_, n)| n.to_string()).collect::<Vec<_>>())
        .unwrap();
    assert_eq!(name, [format!("car-{}", hla_proto::Handle::raw(handle))]);
}

#[test]
fn destroy_names_the_remaining_federates() {
    let mut server = RtiServer::new(RtiConfig::default());
    let id = join(&mut server, "last");

    let err = server.handle(id, &Req::DestroyFederationExecution { federation: "traffic".into() }).unwrap_err();

    insta::assert_snapshot!(id.to_string(), @"conn-1");
    insta::assert_snapshot!(err.to_string(), @"FederatesCurrentlyJoined: traffic has 1 federates");
}

proptest! {
    #[test]
    fn synchronized_only_after_every_member_achieves(
        order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
        failing in proptest::collection::btree_set(0..5usize, 0..3),
    ) {
        let mut server = RtiServer::new(RtiConfig::default());
        let ids: Vec<_> = (0..5).map(|n| join(&mut server, &format!("fed{n}"))).collect();
        server
            .handle(
                ids[0],
                &Req::RegisterFederationSynchronizationPoint {
                    label: "ready".into(),
                    tag: Bytes::new(),
                    federates: None,
                },
            )
            .unwrap();
        for id in &ids {
            drain(&mut server, *id);
        }

        for (step, member) in order.iter().enumerate() {
            server
                .handle(
                    ids[*member],
                    &Req::SynchronizationPointAchieved {
                        label: "ready".into(),
                        successful: !failing.contains(member),
                    },
                )
                .unwrap();
            let last = step + 1 == order.len();
            for id in &ids {
                let received = drain(&mut server, *id);
                if last {
                    let synchronized = matches!(
                        received.as_slice(),
                        [Cb::FederationSynchronized { failed, .. }] if failed.len() == failing.len()
                    );
                    prop_assert!(synchronized);
                } else {
                    prop_assert!(received.is_empty());
                }
            }
        }
    }
}
