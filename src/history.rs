//! Patient drug history: every prescription of a patient joined with its drug records.
//!
//! Drug lookups run concurrently, one per prescription, and are all awaited
//! before the history is returned. A failed lookup degrades that prescription
//! to an empty drug list and is reported in [`PatientHistory::degraded`]; it
//! never fails the whole history.

use std::ops::Range;

use crate::fanout::map_bounded;
use crate::models::*;
use crate::store::{RecordStore, StoreError};

/// Result of one per-prescription drug lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum DrugLookup {
    Loaded(Vec<DrugRecord>),
    Degraded(StoreError),
}

/// A prescription whose drug records could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedLookup {
    pub prescription_id: RecordId,
    pub error: StoreError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientHistory {
    pub patient_id: RecordId,
    pub prescriptions: Vec<Prescription>,
    /// All drug records, in prescription order then in stored order.
    pub drugs: Vec<DrugRecord>,
    pub degraded: Vec<DegradedLookup>,
    spans: Vec<Range<usize>>,
}

impl PatientHistory {
    fn assemble(
        patient_id: RecordId,
        prescriptions: Vec<Prescription>,
        lookups: Vec<DrugLookup>,
    ) -> Self {
        let mut drugs = Vec::new();
        let mut degraded = Vec::new();
        let mut spans = Vec::with_capacity(prescriptions.len());

        for (prescription, lookup) in prescriptions.iter().zip(lookups) {
            let start = drugs.len();
            match lookup {
                DrugLookup::Loaded(records) => drugs.extend(records),
                DrugLookup::Degraded(error) => degraded.push(DegradedLookup {
                    prescription_id: prescription.id,
                    error,
                }),
            }
            spans.push(start..drugs.len());
        }

        Self {
            patient_id,
            prescriptions,
            drugs,
            degraded,
            spans,
        }
    }

    /// Drug records of one prescription; empty for unknown or degraded ones.
    pub fn drugs_for(&self, prescription_id: RecordId) -> &[DrugRecord] {
        self.prescriptions
            .iter()
            .position(|p| p.id == prescription_id)
            .and_then(|i| self.spans.get(i))
            .map(|span| &self.drugs[span.clone()])
            .unwrap_or(&[])
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

pub struct HistoryAggregator<'a> {
    store: &'a dyn RecordStore,
    fanout: usize,
}

impl<'a> HistoryAggregator<'a> {
    pub fn new(store: &'a dyn RecordStore, fanout: usize) -> Self {
        Self {
            store,
            fanout: fanout.max(1),
        }
    }

    /// Fails only if the prescriptions themselves cannot be listed.
    pub fn history(&self, patient_id: RecordId) -> Result<PatientHistory, StoreError> {
        let prescriptions = self.store.prescriptions_for_patient(patient_id)?;

        let lookups = map_bounded(&prescriptions, self.fanout, |_, prescription| {
            match self.store.drugs_for_prescription(prescription.id) {
                Ok(records) => DrugLookup::Loaded(records),
                Err(error) => {
                    tracing::warn!(
                        patient_id,
                        prescription_id = prescription.id,
                        error = %error,
                        "Drug lookup failed, showing prescription without drugs"
                    );
                    DrugLookup::Degraded(error)
                }
            }
        });

        let history = PatientHistory::assemble(patient_id, prescriptions, lookups);
        tracing::debug!(
            patient_id,
            prescriptions = history.prescriptions.len(),
            drugs = history.drugs.len(),
            degraded = history.degraded.len(),
            "History assembled"
        );
        Ok(history)
    }
}
