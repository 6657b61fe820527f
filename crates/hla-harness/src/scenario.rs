//! Multi-federate scenarios over the in-process RTI.
//!
//! A [`SimFederation`] owns one [`LocalRti`], a shared [`SimEnv`] and any
//! number of joined federates, each with a [`Recorder`] as its federate
//! ambassador. Callbacks are evoked, never delivered on a thread, and
//! [`SimFederation::pump`] ticks the federates in an order drawn from the
//! seeded RNG. A scenario therefore replays exactly for a given seed.

use std::ops::Index;

use hla_client::{AmbassadorConfig, RtiAmbassador};
use hla_proto::{
    CallbackModel, ErrorKind, FederateHandle, FomModule, LogicalTime, RtiError,
};
use hla_server::{LocalConnection, LocalRti, RtiConfig};
use tracing::{debug, info};

use crate::{recorder::Recorder, sim_env::SimEnv};

/// Ambassador type every simulated federate uses.
pub type SimAmbassador<T> = RtiAmbassador<T, LocalConnection<T>, SimEnv>;

/// Federate type reported for every simulated federate.
pub const SIM_FEDERATE_TYPE: &str = "sim";

/// Upper bound on pump rounds before callbacks are considered stuck.
pub const MAX_PUMP_ROUNDS: usize = 64;

/// One joined federate.
pub struct SimFederate<T: LogicalTime> {
    name: String,
    handle: FederateHandle,
    ambassador: SimAmbassador<T>,
    recorder: Recorder<T>,
}

impl<T: LogicalTime> SimFederate<T> {
    /// Name it joined with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle assigned at join.
    pub fn handle(&self) -> FederateHandle {
        self.handle
    }

    /// The federate's RTI ambassador.
    pub fn rti(&self) -> &SimAmbassador<T> {
        &self.ambassador
    }

    /// Everything this federate has been called back with.
    pub fn callbacks(&self) -> &Recorder<T> {
        &self.recorder
    }
}

/// A federation execution with simulated federates.
pub struct SimFederation<T: LogicalTime> {
    name: String,
    modules: Vec<FomModule>,
    rti: LocalRti<T>,
    env: SimEnv,
    federates: Vec<SimFederate<T>>,
}

impl<T: LogicalTime> SimFederation<T> {
    /// Federation `name` built from `modules`, with the default RTI
    /// configuration. The execution is created by the first join.
    pub fn new(name: &str, modules: Vec<FomModule>, seed: u64) -> Self {
        Self::with_config(name, modules, seed, RtiConfig::default())
    }

    /// Same as [`SimFederation::new`] with an explicit RTI configuration.
    pub fn with_config(name: &str, modules: Vec<FomModule>, seed: u64, config: RtiConfig) -> Self {
        Self {
            name: name.to_string(),
            modules,
            rti: LocalRti::new(config),
            env: SimEnv::with_seed(seed),
            federates: Vec::new(),
        }
    }

    /// Federation execution name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared RTI.
    pub fn rti(&self) -> &LocalRti<T> {
        &self.rti
    }

    /// The shared simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Connect a new federate, create the execution if needed and join it.
    /// Returns the federate's index.
    pub fn join(&mut self, federate_name: &str) -> Result<usize, RtiError> {
        let ambassador =
            RtiAmbassador::with_env(self.rti.connect()?, self.env.clone(), AmbassadorConfig::default());
        let recorder = Recorder::new();
        ambassador.connect(Box::new(recorder.clone()), CallbackModel::Evoked)?;

        match ambassador.create_federation_execution(&self.name, self.modules.clone()) {
            Ok(()) => info!(federation = %self.name, "federation created"),
            Err(err) if err.is(ErrorKind::FederationExecutionAlreadyExists) => {},
            Err(err) => return Err(err),
        }

        let handle =
            ambassador.join_federation_execution(Some(federate_name), SIM_FEDERATE_TYPE, &self.name)?;
        debug!(federate = federate_name, %handle, "simulated federate joined");

        self.federates.push(SimFederate {
            name: federate_name.to_string(),
            handle,
            ambassador,
            recorder,
        });
        Ok(self.federates.len() - 1)
    }

    /// Federate at `index`, if any.
    pub fn federate(&self, index: usize) -> Option<&SimFederate<T>> {
        self.federates.get(index)
    }

    /// Every federate, in join order.
    pub fn federates(&self) -> &[SimFederate<T>] {
        &self.federates
    }

    /// Number of federates joined through this harness.
    pub fn len(&self) -> usize {
        self.federates.len()
    }

    /// Whether no federate has joined yet.
    pub fn is_empty(&self) -> bool {
        self.federates.is_empty()
    }

    /// Tick every federate, in seeded random order, until none has a
    /// callback left. Returns the number of rounds that delivered anything.
    pub fn pump(&self) -> Result<usize, RtiError> {
        let mut order: Vec<usize> = (0..self.federates.len()).collect();
        for round in 0..MAX_PUMP_ROUNDS {
            self.env.shuffle(&mut order);
            let mut delivered = false;
            for federate in order.iter().filter_map(|&i| self.federates.get(i)) {
                delivered |= federate.ambassador.tick()?;
            }
            if !delivered {
                return Ok(round);
            }
        }
        Err(RtiError::internal(format!("callbacks still pending after {MAX_PUMP_ROUNDS} rounds")))
    }

    /// Discard every recorded callback.
    pub fn clear_callbacks(&self) {
        for federate in &self.federates {
            federate.recorder.take();
        }
    }
}

impl<T: LogicalTime> Index<usize> for SimFederation<T> {
    type Output = SimFederate<T>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.federates[index]
    }
}
