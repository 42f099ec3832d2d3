//! Patient directory over the `patients` collection.
//!
//! Deleting a patient does not touch their prescriptions; those keep a
//! reference to the removed id.

use crate::models::{Patient, PatientFields, RecordId};
use crate::store::{RecordStore, StoreError};

pub struct PatientDirectory<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> PatientDirectory<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<Patient>, StoreError> {
        self.store.list_patients()
    }

    pub fn get(&self, id: RecordId) -> Result<Patient, StoreError> {
        self.store.get_patient(id)
    }

    pub fn create(&self, fields: &PatientFields) -> Result<Patient, StoreError> {
        let patient = self.store.create_patient(fields)?;
        tracing::info!(patient_id = patient.id, "Patient created");
        Ok(patient)
    }

    pub fn update(&self, id: RecordId, fields: &PatientFields) -> Result<Patient, StoreError> {
        let patient = self.store.update_patient(id, fields)?;
        tracing::info!(patient_id = id, "Patient updated");
        Ok(patient)
    }

    pub fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.store.delete_patient(id)?;
        tracing::info!(patient_id = id, "Patient deleted");
        Ok(())
    }
}
