//! Intake session flow: upload → extract → stage → link.

use super::error::{ExtractionError, LinkError};
use super::gateway::ExtractionGateway;
use super::linking::{LinkFailure, LinkReport, LinkingCoordinator, PendingDrugs, ResumeReport};
use super::staging::{SessionId, StagingStore};
use crate::models::{ExtractionEntry, ImageBlob, RecordId};
use crate::store::{ImageService, RecordStore};

pub struct IntakePipeline<'a> {
    gateway: ExtractionGateway<'a>,
    coordinator: LinkingCoordinator<'a>,
    staging: &'a StagingStore,
}

impl<'a> IntakePipeline<'a> {
    pub fn new(
        images: &'a dyn ImageService,
        store: &'a dyn RecordStore,
        staging: &'a StagingStore,
    ) -> Self {
        Self {
            gateway: ExtractionGateway::new(images),
            coordinator: LinkingCoordinator::new(store),
            staging,
        }
    }

    pub fn with_link_fanout(mut self, fanout: usize) -> Self {
        self.coordinator = self.coordinator.with_fanout(fanout);
        self
    }

    pub fn link_fanout(&self) -> usize {
        self.coordinator.fanout()
    }

    /// Extract `images` and stage the result for `session`, replacing any
    /// batch staged there before. On error the session is left as it was.
    pub fn upload(
        &self,
        session: SessionId,
        images: &[ImageBlob],
    ) -> Result<Vec<ExtractionEntry>, ExtractionError> {
        let entries = self.gateway.extract(images)?;
        self.staging.stage(session, entries.clone());
        Ok(entries)
    }

    pub fn staged(&self, session: SessionId) -> Vec<ExtractionEntry> {
        self.staging.current(session)
    }

    pub fn discard(&self, session: SessionId) {
        self.staging.clear(session);
    }

    /// Link the batch staged for `session` to `patient_id`.
    ///
    /// A complete run clears the staged batch. A run with failures restages
    /// only the entries whose prescription was never created, and holds the
    /// drugs of partially linked entries for [`Self::retry_drugs`] alongside
    /// any held by earlier runs. Nothing is linked twice and nothing
    /// recognised is lost. A precondition error leaves the session untouched.
    pub fn link_session(
        &self,
        session: SessionId,
        patient_id: RecordId,
    ) -> Result<LinkReport, LinkError> {
        let entries = self.staging.current(session);
        let report = self.coordinator.link(patient_id, &entries)?;

        let retry: Vec<ExtractionEntry> = report
            .failures
            .iter()
            .filter_map(|failure| match failure {
                LinkFailure::EntryFailed { entry_index, .. } => entries.get(*entry_index).cloned(),
                LinkFailure::PartialFailure { .. } => None,
            })
            .collect();

        let newly_owed: Vec<PendingDrugs> =
            report.failures.iter().filter_map(LinkFailure::pending_drugs).collect();

        if retry.is_empty() {
            self.staging.take(session);
        } else {
            tracing::info!(%session, entries = retry.len(), "Restaging entries that were not linked");
            self.staging.stage(session, retry);
        }
        if !newly_owed.is_empty() {
            tracing::info!(
                %session,
                prescriptions = newly_owed.len(),
                "Holding drug records that were not linked"
            );
            let mut owed = self.staging.pending_drugs(session);
            owed.extend(newly_owed);
            self.staging.hold_drugs(session, owed);
        }
        Ok(report)
    }

    /// Drug records a partial link still owes to prescriptions it created.
    pub fn pending_drugs(&self, session: SessionId) -> Vec<PendingDrugs> {
        self.staging.pending_drugs(session)
    }

    /// Write the drug records held for `session` under their existing
    /// prescriptions. Whatever fails again stays held.
    pub fn retry_drugs(&self, session: SessionId) -> ResumeReport {
        let pending = self.staging.take_pending_drugs(session);
        let report = self.coordinator.resume(&pending);
        self.staging.hold_drugs(session, report.still_pending.clone());
        report
    }
}
