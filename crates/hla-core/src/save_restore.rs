//! Federation save and restore, as seen by one federate.
//!
//! ```text
//! save:    Idle ─initiateFederateSave─▶ Initiated ─saveBegun─▶ Begun
//!            ▲                                                   │ complete / notComplete
//!            └──── federationSaved / federationNotSaved ──── Reported
//!
//! restore: Idle ─federationRestoreBegun─▶ Begun ─initiateFederateRestore─▶ Initiated
//!            ▲                                                               │ complete / notComplete
//!            └──── federationRestored / federationNotRestored ────────── Reported
//! ```
//!
//! The federate-wide phase guard rejects most services while either
//! machine is away from `Idle`.

use hla_proto::{ErrorKind, RtiError};
use tracing::debug;

/// Local save phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SavePhase {
    /// No save in progress.
    #[default]
    Idle,
    /// Told to save, not yet begun.
    Initiated {
        /// Save label.
        label: String,
    },
    /// Saving.
    Begun {
        /// Save label.
        label: String,
    },
    /// Completion reported, waiting for the federation.
    Reported {
        /// Save label.
        label: String,
        /// Reported `federateSaveComplete` (true) or `...NotComplete`.
        success: bool,
    },
}

/// Local restore phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RestorePhase {
    /// No restore in progress.
    #[default]
    Idle,
    /// `federationRestoreBegun` received.
    Begun,
    /// Told which label to restore.
    Initiated {
        /// Restore label.
        label: String,
    },
    /// Completion reported, waiting for the federation.
    Reported {
        /// Restore label.
        label: String,
        /// Reported `federateRestoreComplete` (true) or `...NotComplete`.
        success: bool,
    },
}

/// Save/restore state machine.
#[derive(Debug, Clone, Default)]
pub struct SaveRestore {
    save: SavePhase,
    restore: RestorePhase,
}

impl SaveRestore {
    /// Save phase.
    pub fn save(&self) -> &SavePhase {
        &self.save
    }

    /// Restore phase.
    pub fn restore(&self) -> &RestorePhase {
        &self.restore
    }

    /// A save is in progress.
    pub fn save_in_progress(&self) -> bool {
        self.save != SavePhase::Idle
    }

    /// A restore is in progress.
    pub fn restore_in_progress(&self) -> bool {
        self.restore != RestorePhase::Idle
    }

    /// Label of the save in progress.
    pub fn save_label(&self) -> Option<&str> {
        match &self.save {
            SavePhase::Idle => None,
            SavePhase::Initiated { label }
            | SavePhase::Begun { label }
            | SavePhase::Reported { label, .. } => Some(label),
        }
    }

    /// Label of the restore in progress, once known.
    pub fn restore_label(&self) -> Option<&str> {
        match &self.restore {
            RestorePhase::Idle | RestorePhase::Begun => None,
            RestorePhase::Initiated { label } | RestorePhase::Reported { label, .. } => Some(label),
        }
    }

    /// Validate `requestFederationSave` and `requestFederationRestore`.
    pub fn check_request(&self) -> Result<(), RtiError> {
        if let Some(label) = self.save_label() {
            return Err(RtiError::new(ErrorKind::SaveInProgress, label.to_string()));
        }
        if self.restore_in_progress() {
            return Err(RtiError::new(ErrorKind::RestoreInProgress, "restore in progress"));
        }
        Ok(())
    }

    /// Validate `federateSaveBegun`.
    pub fn check_save_begun(&self) -> Result<(), RtiError> {
        match &self.save {
            SavePhase::Initiated { .. } => Ok(()),
            other => Err(RtiError::new(ErrorKind::SaveNotInitiated, format!("{other:?}"))),
        }
    }

    /// Validate `federateSaveComplete` / `federateSaveNotComplete`.
    pub fn check_save_complete(&self) -> Result<(), RtiError> {
        match &self.save {
            SavePhase::Begun { .. } => Ok(()),
            SavePhase::Initiated { label } => {
                Err(RtiError::new(ErrorKind::FederateHasNotBegunSave, label.clone()))
            },
            other => Err(RtiError::new(ErrorKind::SaveNotInitiated, format!("{other:?}"))),
        }
    }

    /// Validate `federateRestoreComplete` / `federateRestoreNotComplete`.
    pub fn check_restore_complete(&self) -> Result<(), RtiError> {
        match &self.restore {
            RestorePhase::Initiated { .. } => Ok(()),
            other => Err(RtiError::new(ErrorKind::RestoreNotRequested, format!("{other:?}"))),
        }
    }

    /// `initiateFederateSave`.
    pub fn save_initiated(&mut self, label: &str) {
        debug!(label, "save initiated");
        self.save = SavePhase::Initiated { label: label.to_string() };
    }

    /// Record a forwarded `federateSaveBegun`.
    pub fn save_begun(&mut self) {
        if let SavePhase::Initiated { label } = &self.save {
            self.save = SavePhase::Begun { label: label.clone() };
        }
    }

    /// Record a forwarded `federateSaveComplete` / `...NotComplete`.
    pub fn save_reported(&mut self, success: bool) {
        if let SavePhase::Begun { label } = &self.save {
            self.save = SavePhase::Reported { label: label.clone(), success };
        }
    }

    /// `federationSaved` / `federationNotSaved`. Returns the label of the
    /// save that concluded, if this federate took part in it.
    pub fn save_concluded(&mut self) -> Option<String> {
        let label = self.save_label().map(str::to_string);
        debug!(?label, "save concluded");
        self.save = SavePhase::Idle;
        label
    }

    /// `federationRestoreBegun`.
    pub fn restore_begun(&mut self) {
        self.restore = RestorePhase::Begun;
    }

    /// `initiateFederateRestore`.
    pub fn restore_initiated(&mut self, label: &str) {
        debug!(label, "restore initiated");
        self.restore = RestorePhase::Initiated { label: label.to_string() };
    }

    /// Record a forwarded `federateRestoreComplete` / `...NotComplete`.
    pub fn restore_reported(&mut self, success: bool) {
        if let RestorePhase::Initiated { label } = &self.restore {
            self.restore = RestorePhase::Reported { label: label.clone(), success };
        }
    }

    /// `federationRestored` / `federationNotRestored`. Returns the label
    /// that was being restored.
    pub fn restore_concluded(&mut self) -> Option<String> {
        let label = self.restore_label().map(str::to_string);
        debug!(?label, "restore concluded");
        self.restore = RestorePhase::Idle;
        label
    }
}
