//! Linking coordinator: persists staged extraction entries under a patient.
//!
//! Runs in two phases:
//! 1. one prescription per entry, in entry order, collecting the new ids
//! 2. drug records for each created prescription, fanned out per prescription,
//!    sequential within one prescription
//!
//! Phase 2 only ever sees prescriptions that phase 1 created, so no drug
//! record can point at a missing prescription. The store has no transactions:
//! whatever was created before a failure stays created, and the report says
//! exactly where each entry stopped.

use super::error::LinkError;
use crate::fanout::map_bounded;
use crate::models::*;
use crate::store::{RecordStore, StoreError};

const DEFAULT_FANOUT: usize = 4;

/// Why one entry was not fully linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    /// The prescription could not be created; the entry was skipped entirely.
    EntryFailed { entry_index: usize, error: StoreError },
    /// The prescription exists but drug record `failed_drug_index` could not
    /// be created. Drugs before it are persisted; it and the ones after it are
    /// not, and are carried in `missing_drugs`.
    PartialFailure {
        entry_index: usize,
        prescription_id: RecordId,
        failed_drug_index: usize,
        not_attempted: usize,
        missing_drugs: Vec<RawDrug>,
        error: StoreError,
    },
}

impl LinkFailure {
    pub fn entry_index(&self) -> usize {
        match self {
            LinkFailure::EntryFailed { entry_index, .. }
            | LinkFailure::PartialFailure { entry_index, .. } => *entry_index,
        }
    }

    /// The drug records still owed to an existing prescription, if any.
    pub fn pending_drugs(&self) -> Option<PendingDrugs> {
        match self {
            LinkFailure::EntryFailed { .. } => None,
            LinkFailure::PartialFailure {
                entry_index,
                prescription_id,
                failed_drug_index,
                missing_drugs,
                ..
            } => Some(PendingDrugs {
                entry_index: *entry_index,
                prescription_id: *prescription_id,
                first_drug_index: *failed_drug_index,
                drugs: missing_drugs.clone(),
            }),
        }
    }
}

/// Drug records not yet written under a prescription that already exists.
/// `first_drug_index` is the position of `drugs[0]` in the original entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDrugs {
    pub entry_index: usize,
    pub prescription_id: RecordId,
    pub first_drug_index: usize,
    pub drugs: Vec<RawDrug>,
}

/// Outcome of writing pending drug records.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeReport {
    pub created: Vec<DrugRecord>,
    /// Whatever is still missing, starting at the drug that failed again.
    pub still_pending: Vec<PendingDrugs>,
}

impl ResumeReport {
    pub fn is_complete(&self) -> bool {
        self.still_pending.is_empty()
    }
}

/// An entry whose prescription was created, with the drug records created under it.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedEntry {
    pub entry_index: usize,
    pub prescription: Prescription,
    pub drugs: Vec<DrugRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    NothingToLink,
    Complete,
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    pub patient_id: RecordId,
    pub linked: Vec<LinkedEntry>,
    pub failures: Vec<LinkFailure>,
}

impl LinkReport {
    fn nothing_to_link(patient_id: RecordId) -> Self {
        Self {
            patient_id,
            linked: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn status(&self) -> LinkStatus {
        if !self.failures.is_empty() {
            LinkStatus::Partial
        } else if self.linked.is_empty() {
            LinkStatus::NothingToLink
        } else {
            LinkStatus::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn prescriptions_created(&self) -> usize {
        self.linked.len()
    }

    pub fn drug_records_created(&self) -> usize {
        self.linked.iter().map(|l| l.drugs.len()).sum()
    }

    /// Indices of entries that produced no record at all.
    pub fn skipped_entries(&self) -> Vec<usize> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                LinkFailure::EntryFailed { entry_index, .. } => Some(*entry_index),
                LinkFailure::PartialFailure { .. } => None,
            })
            .collect()
    }
}

/// Outcome of phase 2 for one prescription.
struct DrugBatch {
    created: Vec<DrugRecord>,
    failure: Option<(usize, StoreError)>,
}

pub struct LinkingCoordinator<'a> {
    store: &'a dyn RecordStore,
    fanout: usize,
}

impl<'a> LinkingCoordinator<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            fanout: DEFAULT_FANOUT,
        }
    }

    /// Cap on prescriptions whose drug records are written concurrently.
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Persist `entries` under `patient_id`.
    ///
    /// An empty `entries` is a no-op and is not checked against the patient.
    /// Otherwise the patient must exist. Per-entry failures are collected in
    /// the report; `Err` is returned only when nothing was attempted.
    pub fn link(
        &self,
        patient_id: RecordId,
        entries: &[ExtractionEntry],
    ) -> Result<LinkReport, LinkError> {
        if entries.is_empty() {
            tracing::debug!(patient_id, "Nothing to link");
            return Ok(LinkReport::nothing_to_link(patient_id));
        }

        match self.store.get_patient(patient_id) {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => return Err(LinkError::UnknownPatient(patient_id)),
            Err(e) => return Err(LinkError::Store(e)),
        }

        tracing::info!(patient_id, entries = entries.len(), "Linking prescriptions");

        let mut failures = Vec::new();
        let created = self.create_prescriptions(patient_id, entries, &mut failures);

        let batches = map_bounded(&created, self.fanout, |_, (entry_index, prescription)| {
            self.create_drugs(prescription.id, &entries[*entry_index].drugs)
        });

        let mut linked = Vec::with_capacity(created.len());
        for ((entry_index, prescription), batch) in created.into_iter().zip(batches) {
            if let Some((failed_drug_index, error)) = batch.failure {
                let drugs = &entries[entry_index].drugs;
                tracing::warn!(
                    patient_id,
                    entry_index,
                    prescription_id = prescription.id,
                    failed_drug_index,
                    error = %error,
                    "Drug record creation failed, prescription left partially linked"
                );
                failures.push(LinkFailure::PartialFailure {
                    entry_index,
                    prescription_id: prescription.id,
                    failed_drug_index,
                    not_attempted: drugs.len() - failed_drug_index - 1,
                    missing_drugs: drugs[failed_drug_index..].to_vec(),
                    error,
                });
            }
            linked.push(LinkedEntry {
                entry_index,
                prescription,
                drugs: batch.created,
            });
        }
        failures.sort_by_key(LinkFailure::entry_index);

        let report = LinkReport {
            patient_id,
            linked,
            failures,
        };
        tracing::info!(
            patient_id,
            prescriptions = report.prescriptions_created(),
            drugs = report.drug_records_created(),
            failures = report.failures.len(),
            "Linking finished"
        );
        Ok(report)
    }

    /// Write the drug records still owed to existing prescriptions, without
    /// creating any prescription. Each prescription again stops at its first
    /// failed drug; the rest comes back in `still_pending`.
    pub fn resume(&self, pending: &[PendingDrugs]) -> ResumeReport {
        let batches = map_bounded(pending, self.fanout, |_, owed| {
            self.create_drugs(owed.prescription_id, &owed.drugs)
        });

        let mut report = ResumeReport {
            created: Vec::new(),
            still_pending: Vec::new(),
        };
        for (owed, batch) in pending.iter().zip(batches) {
            report.created.extend(batch.created);
            if let Some((failed, error)) = batch.failure {
                tracing::warn!(
                    prescription_id = owed.prescription_id,
                    failed_drug_index = owed.first_drug_index + failed,
                    error = %error,
                    "Drug record creation failed again"
                );
                report.still_pending.push(PendingDrugs {
                    drugs: owed.drugs[failed..].to_vec(),
                    first_drug_index: owed.first_drug_index + failed,
                    ..owed.clone()
                });
            }
        }
        tracing::info!(
            drugs = report.created.len(),
            still_pending = report.still_pending.len(),
            "Pending drug records resumed"
        );
        report
    }

    /// Phase 1. Entries whose prescription fails are recorded and skipped.
    fn create_prescriptions(
        &self,
        patient_id: RecordId,
        entries: &[ExtractionEntry],
        failures: &mut Vec<LinkFailure>,
    ) -> Vec<(usize, Prescription)> {
        let mut created = Vec::with_capacity(entries.len());
        for (entry_index, entry) in entries.iter().enumerate() {
            let new = NewPrescription {
                patient_id,
                image_url: entry.image_url.clone(),
            };
            match self.store.create_prescription(&new) {
                Ok(prescription) => {
                    tracing::debug!(entry_index, prescription_id = prescription.id, "Prescription created");
                    created.push((entry_index, prescription));
                }
                Err(error) => {
                    tracing::warn!(
                        patient_id,
                        entry_index,
                        error = %error,
                        "Prescription creation failed, skipping entry"
                    );
                    failures.push(LinkFailure::EntryFailed { entry_index, error });
                }
            }
        }
        created
    }

    /// Phase 2 for one prescription. Stops at the first failed drug record.
    fn create_drugs(&self, prescription_id: RecordId, drugs: &[RawDrug]) -> DrugBatch {
        let mut created = Vec::with_capacity(drugs.len());
        for (drug_index, raw) in drugs.iter().enumerate() {
            let new = NewDrugRecord::from_raw(prescription_id, raw);
            match self.store.create_drug_record(&new) {
                Ok(record) => created.push(record),
                Err(error) => {
                    return DrugBatch {
                        created,
                        failure: Some((drug_index, error)),
                    }
                }
            }
        }
        DrugBatch {
            created,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    fn scenario_entries() -> Vec<ExtractionEntry> {
        vec![
            ExtractionEntry::new(
                "/media/rx/first.jpg",
                vec![RawDrug::named("Amoxicillin").with_dosage("500mg")],
            ),
            ExtractionEntry::new("/media/rx/second.jpg", vec![RawDrug::named("Ibuprofen")]),
        ]
    }

    #[test]
    fn links_two_images_to_patient() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        let report = LinkingCoordinator::new(&store).link(7, &scenario_entries()).unwrap();

        assert_eq!(report.status(), LinkStatus::Complete);
        assert_eq!(report.prescriptions_created(), 2);
        assert_eq!(report.drug_records_created(), 2);

        let prescriptions = store.prescriptions_for_patient(7).unwrap();
        assert_eq!(prescriptions.len(), 2);
        assert_eq!(prescriptions[0].image_url, "/media/rx/first.jpg");

        let first = &store.drugs_for_prescription(prescriptions[0].id).unwrap()[0];
        assert_eq!(first.name, "Amoxicillin");
        assert_eq!(first.dosage, "500mg");
        assert_eq!(first.strength, "N/A");
        assert_eq!(first.frequency, "N/A");
        assert_eq!(first.duration, "N/A");

        let second = &store.drugs_for_prescription(prescriptions[1].id).unwrap()[0];
        assert_eq!(second.name, "Ibuprofen");
        assert_eq!(second.dosage, "N/A");
    }

    #[test]
    fn empty_entries_is_noop_even_for_unknown_patient() {
        let store = InMemoryRecordStore::new();
        let report = LinkingCoordinator::new(&store).link(99, &[]).unwrap();

        assert_eq!(report.status(), LinkStatus::NothingToLink);
        assert_eq!(report.prescriptions_created(), 0);
        assert_eq!(report.drug_records_created(), 0);
        assert!(store.all_prescriptions().is_empty());
    }

    #[test]
    fn unknown_patient_creates_nothing() {
        let store = InMemoryRecordStore::new();
        let err = LinkingCoordinator::new(&store).link(99, &scenario_entries()).unwrap_err();
        assert_eq!(err, LinkError::UnknownPatient(99));
        assert!(store.all_prescriptions().is_empty());
    }

    #[test]
    fn preserves_entry_and_drug_order() {
        let store = InMemoryRecordStore::new().with_patient(1, "Ada");
        let entries: Vec<ExtractionEntry> = (0..5)
            .map(|i| {
                let drugs = (0..=i).map(|j| RawDrug::named(&format!("drug-{i}-{j}"))).collect();
                ExtractionEntry::new(&format!("/media/{i}.jpg"), drugs)
            })
            .collect();

        let report = LinkingCoordinator::new(&store).with_fanout(3).link(1, &entries).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.drug_records_created(), 15);

        for (i, linked) in report.linked.iter().enumerate() {
            assert_eq!(linked.entry_index, i);
            assert_eq!(linked.prescription.image_url, format!("/media/{i}.jpg"));
            let stored = store.drugs_for_prescription(linked.prescription.id).unwrap();
            let names: Vec<_> = stored.iter().map(|d| d.name.clone()).collect();
            let expected: Vec<_> = (0..=i).map(|j| format!("drug-{i}-{j}")).collect();
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn first_drug_failure_leaves_prescription_without_drugs() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        store.fail_drug_named("Amoxicillin");

        let report = LinkingCoordinator::new(&store).link(7, &scenario_entries()).unwrap();
        assert_eq!(report.status(), LinkStatus::Partial);

        let rx_id = report.linked[0].prescription.id;
        assert!(store.drugs_for_prescription(rx_id).unwrap().is_empty());
        assert!(matches!(
            report.failures[0],
            LinkFailure::PartialFailure {
                entry_index: 0,
                prescription_id,
                failed_drug_index: 0,
                not_attempted: 0,
                ref missing_drugs,
                ..
            } if prescription_id == rx_id && missing_drugs[0].name == "Amoxicillin"
        ));
        // The other entry is unaffected.
        assert_eq!(report.linked[1].drugs.len(), 1);
    }

    #[test]
    fn partial_failure_reports_exact_drug_index() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        store.fail_drug_named("Broken");
        let entries = vec![ExtractionEntry::new(
            "/media/a.jpg",
            vec![
                RawDrug::named("Amoxicillin"),
                RawDrug::named("Broken"),
                RawDrug::named("Ibuprofen"),
                RawDrug::named("Paracetamol"),
            ],
        )];

        let report = LinkingCoordinator::new(&store).link(7, &entries).unwrap();
        let failure = &report.failures[0];
        assert!(matches!(
            failure,
            LinkFailure::PartialFailure { failed_drug_index: 1, not_attempted: 2, .. }
        ));
        let pending = failure.pending_drugs().unwrap();
        assert_eq!(pending.first_drug_index, 1);
        assert_eq!(pending.drugs, entries[0].drugs[1..].to_vec());
        assert_eq!(report.linked[0].drugs.len(), 1);
        assert_eq!(store.all_drugs().len(), 1);
    }

    #[test]
    fn resume_writes_only_missing_drugs() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        store.fail_drug_named("Broken");
        let entries = vec![ExtractionEntry::new(
            "/media/a.jpg",
            vec![
                RawDrug::named("Amoxicillin"),
                RawDrug::named("Broken").with_dosage("5mg"),
                RawDrug::named("Ibuprofen"),
            ],
        )];
        let coordinator = LinkingCoordinator::new(&store);
        let report = coordinator.link(7, &entries).unwrap();
        let pending: Vec<_> = report.failures.iter().filter_map(LinkFailure::pending_drugs).collect();

        // Still failing: nothing new is written and the same drugs stay owed.
        let again = coordinator.resume(&pending);
        assert!(again.created.is_empty());
        assert_eq!(again.still_pending, pending);

        store.allow_drug_named("Broken");
        let done = coordinator.resume(&again.still_pending);
        assert!(done.is_complete());
        assert_eq!(store.all_prescriptions().len(), 1);

        let rx_id = report.linked[0].prescription.id;
        let stored = store.drugs_for_prescription(rx_id).unwrap();
        let names: Vec<_> = stored.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Amoxicillin", "Broken", "Ibuprofen"]);
        assert_eq!(stored[1].dosage, "5mg");
    }

    #[test]
    fn failed_prescription_skips_entry_and_continues() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        store.fail_prescription_for("/media/rx/first.jpg");

        let report = LinkingCoordinator::new(&store).link(7, &scenario_entries()).unwrap();
        assert_eq!(report.skipped_entries(), vec![0]);
        assert_eq!(report.prescriptions_created(), 1);
        assert_eq!(report.linked[0].entry_index, 1);
        assert_eq!(report.linked[0].drugs[0].name, "Ibuprofen");
        // No drug record for the skipped entry exists anywhere.
        assert!(store.all_drugs().iter().all(|d| d.name != "Amoxicillin"));
    }

    #[test]
    fn failures_sorted_by_entry() {
        let store = InMemoryRecordStore::new().with_patient(7, "Ada");
        store.fail_drug_named("Amoxicillin");
        store.fail_prescription_for("/media/rx/second.jpg");

        let report = LinkingCoordinator::new(&store).link(7, &scenario_entries()).unwrap();
        let indices: Vec<_> = report.failures.iter().map(LinkFailure::entry_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
