//! Shared application state: one record store, one staging area, one config.
//!
//! Components are cheap borrowing views created on demand.

use crate::config::ClientConfig;
use crate::history::HistoryAggregator;
use crate::images::PrescriptionImages;
use crate::patients::PatientDirectory;
use crate::pipeline::{IntakePipeline, SessionId, StagingStore};
use crate::store::{HttpRecordStore, ImageService, RecordStore, StoreError};

pub struct CoreState<S = HttpRecordStore> {
    store: S,
    staging: StagingStore,
    config: ClientConfig,
}

impl CoreState<HttpRecordStore> {
    /// State backed by the remote record store described by `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, StoreError> {
        let store = HttpRecordStore::new(&config)?;
        tracing::info!(api = store.base_url(), "Record store client ready");
        Ok(Self::with_store(store, config))
    }
}

impl<S: RecordStore + ImageService> CoreState<S> {
    pub fn with_store(store: S, config: ClientConfig) -> Self {
        Self {
            store,
            staging: StagingStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn open_session(&self) -> SessionId {
        self.staging.open_session()
    }

    pub fn patients(&self) -> PatientDirectory<'_> {
        PatientDirectory::new(&self.store)
    }

    pub fn intake(&self) -> IntakePipeline<'_> {
        IntakePipeline::new(&self.store, &self.store, &self.staging)
            .with_link_fanout(self.config.link_fanout)
    }

    pub fn history(&self) -> HistoryAggregator<'_> {
        HistoryAggregator::new(&self.store, self.config.history_fanout)
    }

    pub fn images(&self) -> PrescriptionImages<'_> {
        PrescriptionImages::new(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionEntry, ImageBlob, PatientFields, RawDrug};
    use crate::store::InMemoryRecordStore;

    fn state() -> CoreState<InMemoryRecordStore> {
        CoreState::with_store(InMemoryRecordStore::new(), ClientConfig::default())
    }

    #[test]
    fn intake_then_history_round() {
        let state = state();
        let patient = state
            .patients()
            .create(&PatientFields {
                name: "Ada".into(),
                age: 36,
                address: "1 Analytical Way".into(),
                phone: "555-0100".into(),
                email: "ada@example.org".into(),
            })
            .unwrap();

        state.store().queue_recognition(Ok(vec![
            ExtractionEntry::new("/m/a.jpg", vec![RawDrug::named("Amoxicillin").with_dosage("500mg")]),
            ExtractionEntry::new("/m/b.jpg", vec![RawDrug::named("Ibuprofen")]),
        ]));
        let session = state.open_session();
        state
            .intake()
            .upload(session, &[ImageBlob::new("a.jpg", vec![]), ImageBlob::new("b.jpg", vec![])])
            .unwrap();
        let report = state.intake().link_session(session, patient.id).unwrap();
        assert!(report.is_complete());

        let history = state.history().history(patient.id).unwrap();
        assert_eq!(history.prescriptions.len(), 2);
        assert_eq!(history.drugs.len(), 2);
        assert_eq!(history.drugs[1].dosage, "N/A");
    }

    #[test]
    fn sessions_from_one_state_do_not_share_staging() {
        let state = state();
        state.store().queue_recognition(Ok(vec![ExtractionEntry::new("/m/a.jpg", vec![])]));

        let first = state.open_session();
        let second = state.open_session();
        state.intake().upload(first, &[ImageBlob::new("a.jpg", vec![])]).unwrap();

        assert_eq!(state.intake().staged(first).len(), 1);
        assert!(state.intake().staged(second).is_empty());
    }

    #[test]
    fn intake_uses_configured_link_fanout() {
        let config = ClientConfig {
            link_fanout: 1,
            ..ClientConfig::default()
        };
        let state = CoreState::with_store(InMemoryRecordStore::new(), config);
        assert_eq!(state.intake().link_fanout(), 1);
        assert_eq!(self::state().intake().link_fanout(), 4);
    }

    #[test]
    fn connect_uses_configured_base_url() {
        let config = ClientConfig {
            api_base_url: "http://records.local:9000".into(),
            ..ClientConfig::default()
        };
        let state = CoreState::connect(config).unwrap();
        assert_eq!(state.store().base_url(), "http://records.local:9000");
    }
}
