//! In-process record store for tests and offline use.
//!
//! Behaves like the remote API (sequential ids, lookups by parent id) and can
//! be told to fail specific calls. Unlike the remote API it refuses a drug
//! record whose prescription does not exist, so creation-order bugs surface
//! as errors.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use super::{ImageService, RecordStore, StoreError};
use crate::models::*;

#[derive(Default)]
struct State {
    next_id: RecordId,
    patients: Vec<Patient>,
    prescriptions: Vec<Prescription>,
    drugs: Vec<DrugRecord>,
    images: HashMap<RecordId, Vec<u8>>,
    recognitions: VecDeque<Result<Vec<ExtractionEntry>, StoreError>>,
    upload_calls: usize,
    failures: Failures,
}

#[derive(Default)]
struct Failures {
    prescription_images: HashSet<String>,
    drug_names: HashSet<String>,
    drug_lookups: HashSet<RecordId>,
    lookup_delays: HashMap<RecordId, Duration>,
}

impl State {
    fn next_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

pub struct InMemoryRecordStore {
    state: Mutex<State>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))
    }

    /// Insert a patient with a fixed id.
    pub fn with_patient(self, id: RecordId, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.patients.push(Patient {
                id,
                name: name.to_string(),
                age: 40,
                address: String::new(),
                phone: String::new(),
                email: String::new(),
                created_at: Utc::now(),
            });
            state.next_id = state.next_id.max(id);
        }
        self
    }

    /// Queue the result of the next `upload_images` call.
    pub fn queue_recognition(&self, result: Result<Vec<ExtractionEntry>, StoreError>) {
        if let Ok(mut state) = self.state.lock() {
            state.recognitions.push_back(result);
        }
    }

    /// Fail prescription creation for this image reference.
    pub fn fail_prescription_for(&self, image_url: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.prescription_images.insert(image_url.to_string());
        }
    }

    pub fn allow_prescription_for(&self, image_url: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.prescription_images.remove(image_url);
        }
    }

    /// Fail drug-record creation for drugs with this name.
    pub fn fail_drug_named(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.drug_names.insert(name.to_string());
        }
    }

    pub fn allow_drug_named(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.drug_names.remove(name);
        }
    }

    /// Fail drug lookups for this prescription.
    pub fn fail_drug_lookup(&self, prescription_id: RecordId) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.drug_lookups.insert(prescription_id);
        }
    }

    /// Hold drug lookups for this prescription before answering.
    pub fn delay_drug_lookup(&self, prescription_id: RecordId, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.lookup_delays.insert(prescription_id, delay);
        }
    }

    pub fn put_image(&self, prescription_id: RecordId, bytes: Vec<u8>) {
        if let Ok(mut state) = self.state.lock() {
            state.images.insert(prescription_id, bytes);
        }
    }

    pub fn all_prescriptions(&self) -> Vec<Prescription> {
        self.lock().map(|s| s.prescriptions.clone()).unwrap_or_default()
    }

    pub fn all_drugs(&self) -> Vec<DrugRecord> {
        self.lock().map(|s| s.drugs.clone()).unwrap_or_default()
    }

    pub fn upload_calls(&self) -> usize {
        self.lock().map(|s| s.upload_calls).unwrap_or_default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Ok(self.lock()?.patients.clone())
    }

    fn get_patient(&self, id: RecordId) -> Result<Patient, StoreError> {
        self.lock()?
            .patients
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { collection: "patients", id })
    }

    fn create_patient(&self, fields: &PatientFields) -> Result<Patient, StoreError> {
        let mut state = self.lock()?;
        let patient = Patient {
            id: state.next_id(),
            name: fields.name.clone(),
            age: fields.age,
            address: fields.address.clone(),
            phone: fields.phone.clone(),
            email: fields.email.clone(),
            created_at: Utc::now(),
        };
        state.patients.push(patient.clone());
        Ok(patient)
    }

    fn update_patient(&self, id: RecordId, fields: &PatientFields) -> Result<Patient, StoreError> {
        let mut state = self.lock()?;
        let patient = state
            .patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound { collection: "patients", id })?;
        patient.name = fields.name.clone();
        patient.age = fields.age;
        patient.address = fields.address.clone();
        patient.phone = fields.phone.clone();
        patient.email = fields.email.clone();
        Ok(patient.clone())
    }

    fn delete_patient(&self, id: RecordId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let before = state.patients.len();
        state.patients.retain(|p| p.id != id);
        if state.patients.len() == before {
            return Err(StoreError::NotFound { collection: "patients", id });
        }
        Ok(())
    }

    fn create_prescription(&self, new: &NewPrescription) -> Result<Prescription, StoreError> {
        let mut state = self.lock()?;
        if state.failures.prescription_images.contains(&new.image_url) {
            return Err(StoreError::Status {
                status: 500,
                body: format!("could not store prescription for {}", new.image_url),
            });
        }
        let prescription = Prescription {
            id: state.next_id(),
            patient_id: new.patient_id,
            image_url: new.image_url.clone(),
            created_at: Utc::now(),
        };
        state.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    fn prescriptions_for_patient(
        &self,
        patient_id: RecordId,
    ) -> Result<Vec<Prescription>, StoreError> {
        Ok(self
            .lock()?
            .prescriptions
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn create_drug_record(&self, new: &NewDrugRecord) -> Result<DrugRecord, StoreError> {
        let mut state = self.lock()?;
        if !state.prescriptions.iter().any(|p| p.id == new.prescription_id) {
            return Err(StoreError::NotFound {
                collection: "prescriptions",
                id: new.prescription_id,
            });
        }
        if state.failures.drug_names.contains(&new.name) {
            return Err(StoreError::Status {
                status: 500,
                body: format!("could not store drug {}", new.name),
            });
        }
        let id = state.next_id();
        let record = new.clone().into_record(id);
        state.drugs.push(record.clone());
        Ok(record)
    }

    fn drugs_for_prescription(
        &self,
        prescription_id: RecordId,
    ) -> Result<Vec<DrugRecord>, StoreError> {
        let delay = {
            let state = self.lock()?;
            if state.failures.drug_lookups.contains(&prescription_id) {
                return Err(StoreError::Connection("memory".into()));
            }
            state.failures.lookup_delays.get(&prescription_id).copied()
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(self
            .lock()?
            .drugs
            .iter()
            .filter(|d| d.prescription_id == prescription_id)
            .cloned()
            .collect())
    }
}

impl ImageService for InMemoryRecordStore {
    fn upload_images(&self, images: &[ImageBlob]) -> Result<Vec<ExtractionEntry>, StoreError> {
        let mut state = self.lock()?;
        state.upload_calls += 1;
        match state.recognitions.pop_front() {
            Some(result) => result,
            None => Ok(images
                .iter()
                .map(|image| ExtractionEntry::new(&format!("/media/{}", image.file_name), vec![]))
                .collect()),
        }
    }

    fn prescription_image(&self, prescription_id: RecordId) -> Result<Vec<u8>, StoreError> {
        self.lock()?
            .images
            .get(&prescription_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                collection: "prescriptions",
                id: prescription_id,
            })
    }
}
