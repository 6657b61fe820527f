//! Model world: one object, a few federates, one owner per attribute.
//!
//! Every federate publishes every attribute and knows the object.
//! Federate 0 registered it and starts out owning every attribute.

use super::operation::{Operation, OperationError, OperationResult, OwnershipAction};

/// Ownership state of one attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelAttribute {
    /// Owning federate, `None` when unowned.
    pub owner: Option<usize>,
    /// The owner has a negotiated divestiture pending.
    pub divesting: bool,
    /// Federate waiting for the owner to release.
    pub acquirer: Option<usize>,
}

impl ModelAttribute {
    fn check_owned(&self, federate: usize) -> Result<(), OperationError> {
        if self.owner == Some(federate) { Ok(()) } else { Err(OperationError::NotOwned) }
    }

    fn check_divesting(&self, federate: usize) -> Result<(), OperationError> {
        self.check_owned(federate)?;
        if self.divesting { Ok(()) } else { Err(OperationError::DivestitureNotRequested) }
    }

    /// Ownership passes to the pending acquirer, or to nobody.
    fn transfer_or_release(&mut self) {
        self.divesting = false;
        self.owner = self.acquirer.take();
    }

    fn acquire(&mut self, federate: usize, negotiate: bool) -> Result<(), OperationError> {
        if self.owner == Some(federate) {
            return Err(OperationError::OwnsAttribute);
        }
        if self.acquirer == Some(federate) {
            return Err(OperationError::AlreadyBeingAcquired);
        }
        if self.acquirer.is_some() {
            // Contested: the caller is told the attribute is unavailable.
            return Ok(());
        }
        match self.owner {
            None => self.owner = Some(federate),
            Some(_) if self.divesting => {
                self.owner = Some(federate);
                self.divesting = false;
            },
            Some(_) if negotiate => self.acquirer = Some(federate),
            Some(_) => {},
        }
        Ok(())
    }
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Owner of each attribute, in attribute order.
    pub owners: Vec<Option<usize>>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    federates: usize,
    attributes: Vec<ModelAttribute>,
}

impl ModelWorld {
    /// World of `federates` federates sharing one object with `attributes`
    /// attributes, all owned by federate 0.
    pub fn new(federates: usize, attributes: usize) -> Self {
        let initial = ModelAttribute { owner: Some(0), ..ModelAttribute::default() };
        Self { federates: federates.max(1), attributes: vec![initial; attributes.max(1)] }
    }

    /// Number of federates.
    pub fn num_federates(&self) -> usize {
        self.federates
    }

    /// Number of attributes of the shared object.
    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Federate and attribute index `op` resolves to.
    pub fn target(&self, op: &Operation) -> (usize, usize) {
        (usize::from(op.federate) % self.federates, usize::from(op.attribute) % self.attributes.len())
    }

    /// State of attribute `index`.
    pub fn attribute(&self, index: usize) -> Option<&ModelAttribute> {
        self.attributes.get(index)
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let (federate, index) = self.target(op);
        let Some(state) = self.attributes.get_mut(index) else {
            return OperationResult::Ok;
        };
        let result = match op.action {
            OwnershipAction::UnconditionalDivest => state.check_owned(federate).map(|()| {
                state.transfer_or_release();
            }),
            OwnershipAction::NegotiatedDivest => state.check_owned(federate).and_then(|()| {
                if state.divesting {
                    return Err(OperationError::AlreadyBeingDivested);
                }
                if state.acquirer.is_some() {
                    state.transfer_or_release();
                } else {
                    state.divesting = true;
                }
                Ok(())
            }),
            OwnershipAction::ConfirmDivestiture => state.check_divesting(federate).map(|()| {
                state.transfer_or_release();
            }),
            OwnershipAction::CancelNegotiatedDivestiture => {
                state.check_divesting(federate).map(|()| state.divesting = false)
            },
            OwnershipAction::DivestIfWanted | OwnershipAction::ReleaseResponse => {
                state.check_owned(federate).map(|()| {
                    if state.acquirer.is_some() {
                        state.transfer_or_release();
                    }
                })
            },
            OwnershipAction::Acquire => state.acquire(federate, true),
            OwnershipAction::AcquireIfAvailable => state.acquire(federate, false),
            OwnershipAction::ReleaseDenied => state.check_owned(federate).map(|()| state.acquirer = None),
            OwnershipAction::CancelAcquisition => {
                if state.owner == Some(federate) {
                    Err(OperationError::AlreadyOwned)
                } else if state.acquirer != Some(federate) {
                    Err(OperationError::AcquisitionNotRequested)
                } else {
                    state.acquirer = None;
                    Ok(())
                }
            },
        };
        result.into()
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState { owners: self.attributes.iter().map(|a| a.owner).collect() }
    }
}
