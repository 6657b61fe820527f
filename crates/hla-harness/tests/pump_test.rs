//! Callback pumping against the simulated clock.

use std::time::Duration;

use bytes::Bytes;
use hla_client::{AmbassadorConfig, CallbackResult, FederateAmbassador, RtiAmbassador};
use hla_harness::SimEnv;
use hla_proto::{CallbackModel, Float64Time, FomModule};
use hla_server::LocalRti;

/// Spends one simulated second on every announcement.
struct Slow {
    env: SimEnv,
}

impl FederateAmbassador<Float64Time> for Slow {
    fn announce_synchronization_point(&mut self, _label: &str, _tag: &Bytes) -> CallbackResult {
        self.env.advance(Duration::from_secs(1));
        Ok(())
    }
}

#[test]
fn evoke_multiple_stops_once_max_wait_has_passed() {
    let env = SimEnv::with_seed(5);
    let rti = LocalRti::<Float64Time>::default();
    let ambassador = RtiAmbassador::with_env(rti.connect().unwrap(), env.clone(), AmbassadorConfig::default());
    ambassador.connect(Box::new(Slow { env: env.clone() }), CallbackModel::Evoked).unwrap();
    ambassador
        .create_federation_execution("slow", vec![FomModule::new("slow").object_class("Thing", None, &["a"])])
        .unwrap();
    ambassador.join_federation_execution(Some("only"), "sim", "slow").unwrap();
    for n in 0..5 {
        ambassador.register_federation_synchronization_point(&format!("p{n}"), Bytes::new(), None).unwrap();
    }
    let start = env.elapsed();

    // Queued in pairs (registration succeeded, announce); only announcements
    // cost time. Three simulated seconds pass before 2.5s is noticed.
    assert!(ambassador.evoke_multiple_callbacks(Duration::ZERO, Duration::from_millis(2500)).unwrap());
    assert_eq!(env.elapsed() - start, Duration::from_secs(3));

    assert!(ambassador.tick().unwrap());
    assert_eq!(env.elapsed() - start, Duration::from_secs(5));
    assert!(!ambassador.tick().unwrap());
}
