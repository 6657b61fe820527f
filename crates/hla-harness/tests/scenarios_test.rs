//! End-to-end federation scenarios.
//!
//! Each scenario runs real ambassadors against the in-process RTI under a
//! fixed seed and asserts on the exact callbacks every federate received.

use std::collections::BTreeSet;

use bytes::Bytes;
use hla_harness::SimFederation;
use hla_proto::{
    AttributeHandleSet, Callback, ErrorKind, Float64Interval, Float64Time, FomModule, OrderType,
    ParameterValues,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fom() -> FomModule {
    FomModule::new("traffic")
        .object_class("Vehicle", None, &["position", "speed", "heading"])
        .interaction_class("Honk", None, &["volume"])
}

fn t(value: f64) -> Float64Time {
    Float64Time::new(value).unwrap()
}

fn federation(names: &[&str], seed: u64) -> SimFederation<Float64Time> {
    init_logging();
    let mut federation = SimFederation::new("traffic", vec![fom()], seed);
    for name in names {
        federation.join(name).unwrap();
    }
    federation
}

#[test]
fn scenario_a_registered_object_is_discovered_once() {
    let federation = federation(&["producer", "consumer"], 1);
    let (producer, consumer) = (&federation[0], &federation[1]);
    let class = producer.rti().get_object_class_handle("Vehicle").unwrap();
    let attributes: AttributeHandleSet = ["position", "speed", "heading"]
        .into_iter()
        .map(|name| producer.rti().get_attribute_handle(class, name).unwrap())
        .collect();

    producer.rti().publish_object_class_attributes(class, attributes.clone()).unwrap();
    consumer.rti().subscribe_object_class_attributes(class, attributes).unwrap();
    federation.pump().unwrap();
    federation.clear_callbacks();

    let registered: Vec<_> = (0..3).map(|_| producer.rti().register_object_instance(class).unwrap()).collect();
    federation.pump().unwrap();

    let distinct: BTreeSet<_> = registered.iter().collect();
    assert_eq!(distinct.len(), registered.len());

    let discovered = consumer.callbacks().take();
    assert_eq!(discovered.len(), registered.len());
    for (callback, object) in discovered.iter().zip(&registered) {
        assert!(matches!(
            callback,
            Callback::DiscoverObjectInstance { object: seen, class: c, producer: p, .. }
                if seen == object && *c == class && *p == producer.handle()
        ));
    }
    assert!(producer.callbacks().named("discoverObjectInstance").is_empty());
}

#[test]
fn scenario_b_negotiated_divestiture_meets_acquisition_if_available() {
    let federation = federation(&["a", "b"], 2);
    let (a, b) = (&federation[0], &federation[1]);
    let class = a.rti().get_object_class_handle("Vehicle").unwrap();
    let attributes: AttributeHandleSet = ["position", "speed", "heading"]
        .into_iter()
        .map(|name| a.rti().get_attribute_handle(class, name).unwrap())
        .collect();
    let position = a.rti().get_attribute_handle(class, "position").unwrap();
    let offered: AttributeHandleSet = std::iter::once(position).collect();

    a.rti().publish_object_class_attributes(class, attributes.clone()).unwrap();
    b.rti().publish_object_class_attributes(class, attributes.clone()).unwrap();
    b.rti().subscribe_object_class_attributes(class, attributes).unwrap();
    let object = a.rti().register_object_instance(class).unwrap();
    federation.pump().unwrap();
    federation.clear_callbacks();

    a.rti().negotiated_attribute_ownership_divestiture(object, offered.clone(), "NA").unwrap();
    federation.pump().unwrap();
    assert_eq!(
        b.callbacks().take(),
        [Callback::RequestAttributeOwnershipAssumption {
            object,
            attributes: offered.clone(),
            tag: Bytes::from_static(b"NA"),
        }]
    );

    b.rti().attribute_ownership_acquisition_if_available(object, offered.clone()).unwrap();
    federation.pump().unwrap();

    assert_eq!(
        b.callbacks().take(),
        [Callback::AttributeOwnershipAcquisitionNotification {
            object,
            attributes: offered.clone(),
            tag: Bytes::new(),
        }]
    );
    assert_eq!(
        a.callbacks().take(),
        [Callback::AttributeOwnershipDivestitureNotification { object, attributes: offered }]
    );
    assert!(b.rti().is_attribute_owned_by_federate(object, position).unwrap());
    assert!(!a.rti().is_attribute_owned_by_federate(object, position).unwrap());
}

#[test]
fn scenario_c_second_save_is_refused_while_the_first_runs() {
    let federation = federation(&["first", "second"], 3);
    let (first, second) = (&federation[0], &federation[1]);

    first.rti().request_federation_save("S1", None).unwrap();
    federation.pump().unwrap();

    let initiated = Callback::InitiateFederateSave { label: "S1".into(), time: None };
    assert_eq!(first.callbacks().take(), [initiated.clone()]);
    assert_eq!(second.callbacks().take(), [initiated]);

    let err = first.rti().request_federation_save("S2", None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SaveInProgress);

    for federate in federation.federates() {
        federate.rti().federate_save_begun().unwrap();
        federate.rti().federate_save_complete().unwrap();
    }
    federation.pump().unwrap();
    for federate in federation.federates() {
        assert_eq!(federate.callbacks().take(), [Callback::FederationSaved]);
    }
    assert_eq!(
        federation.rti().with_federation("traffic", |f| f.saved_labels().map(str::to_string).collect::<Vec<_>>()).unwrap(),
        ["S1"]
    );
}

#[test]
fn synchronization_point_callbacks_in_order() {
    let federation = federation(&["leader", "follower"], 6);
    federation[0].rti().register_federation_synchronization_point("ready", "go", None).unwrap();
    federation.pump().unwrap();
    for federate in federation.federates() {
        federate.rti().synchronization_point_achieved("ready", true).unwrap();
    }
    federation.pump().unwrap();

    let names = |index: usize| {
        federation[index].callbacks().take().iter().map(Callback::name).collect::<Vec<_>>().join("\n")
    };
    insta::assert_snapshot!(names(0), @r"
    synchronizationPointRegistrationSucceeded
    announceSynchronizationPoint
    federationSynchronized
    ");
    insta::assert_snapshot!(names(1), @r"
    announceSynchronizationPoint
    federationSynchronized
    ");
}

#[test]
fn scenario_d_timestamped_interaction_waits_for_the_listener() {
    let federation = federation(&["sender", "listener"], 4);
    let (sender, listener) = (&federation[0], &federation[1]);
    let honk = sender.rti().get_interaction_class_handle("Honk").unwrap();
    let volume = sender.rti().get_parameter_handle(honk, "volume").unwrap();

    sender.rti().enable_time_regulation(Float64Interval::new(1.0).unwrap()).unwrap();
    sender.rti().publish_interaction_class(honk).unwrap();
    listener.rti().enable_time_constrained().unwrap();
    listener.rti().subscribe_interaction_class(honk).unwrap();
    federation.pump().unwrap();

    sender.rti().time_advance_request(t(5.0)).unwrap();
    federation.pump().unwrap();
    listener.rti().time_advance_request(t(5.0)).unwrap();
    federation.pump().unwrap();
    assert_eq!(listener.rti().query_logical_time().unwrap(), t(5.0));
    federation.clear_callbacks();

    let mut parameters = ParameterValues::new();
    parameters.add(volume, Bytes::from_static(b"loud")).unwrap();
    let retraction = sender.rti().send_interaction_at(honk, parameters, "beep", t(10.0)).unwrap();
    assert!(retraction.is_some());
    federation.pump().unwrap();
    assert!(listener.callbacks().is_empty());

    listener.rti().time_advance_request(t(7.0)).unwrap();
    federation.pump().unwrap();
    assert!(listener.callbacks().is_empty(), "granted past the regulator's bound");

    sender.rti().time_advance_request(t(20.0)).unwrap();
    federation.pump().unwrap();
    assert_eq!(listener.callbacks().take(), [Callback::TimeAdvanceGrant { time: t(7.0) }]);

    listener.rti().time_advance_request(t(10.0)).unwrap();
    federation.pump().unwrap();

    let received = listener.callbacks().take();
    let [Callback::ReceiveInteraction { class, parameters, tag, info }, Callback::TimeAdvanceGrant { time }] =
        received.as_slice()
    else {
        panic!("unexpected callbacks {received:?}");
    };
    assert_eq!(*class, honk);
    assert_eq!(parameters.get(volume), Some(&Bytes::from_static(b"loud")));
    assert_eq!(tag, &Bytes::from_static(b"beep"));
    assert_eq!(info.order, OrderType::Timestamp);
    assert_eq!(info.time, Some(t(10.0)));
    assert_eq!(info.producer, sender.handle());
    assert_eq!(*time, t(10.0));
}

#[test]
fn same_seed_same_callbacks() {
    let run = |seed| {
        let federation = federation(&["a", "b", "c"], seed);
        federation[0].rti().register_federation_synchronization_point("go", Bytes::new(), None).unwrap();
        for federate in federation.federates() {
            federation.pump().unwrap();
            federate.rti().synchronization_point_achieved("go", true).unwrap();
        }
        federation.pump().unwrap();
        federation.federates().iter().map(|f| f.callbacks().take()).collect::<Vec<_>>()
    };

    assert_eq!(run(11), run(11));
}
