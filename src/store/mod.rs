//! Remote record store boundary.
//!
//! The persistence API exposes three collections (`patients`, `prescriptions`,
//! `druginformation`) plus an image upload/recognition endpoint. It offers no
//! transactions and no referential guarantees; callers are responsible for
//! creation order.

pub mod http;
pub mod memory;

use thiserror::Error;

use crate::models::*;

pub use http::HttpRecordStore;
pub use memory::InMemoryRecordStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record store is not reachable at {0}")]
    Connection(String),

    #[error("Record store returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Record not found: {collection} with id {id}")]
    NotFound { collection: &'static str, id: RecordId },

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// CRUD over the three record collections.
pub trait RecordStore: Send + Sync {
    fn list_patients(&self) -> Result<Vec<Patient>, StoreError>;

    fn get_patient(&self, id: RecordId) -> Result<Patient, StoreError>;

    fn create_patient(&self, fields: &PatientFields) -> Result<Patient, StoreError>;

    fn update_patient(&self, id: RecordId, fields: &PatientFields) -> Result<Patient, StoreError>;

    /// Deletes the patient only. Prescriptions referencing it are left in place.
    fn delete_patient(&self, id: RecordId) -> Result<(), StoreError>;

    fn create_prescription(&self, new: &NewPrescription) -> Result<Prescription, StoreError>;

    fn prescriptions_for_patient(&self, patient_id: RecordId)
        -> Result<Vec<Prescription>, StoreError>;

    fn create_drug_record(&self, new: &NewDrugRecord) -> Result<DrugRecord, StoreError>;

    fn drugs_for_prescription(&self, prescription_id: RecordId)
        -> Result<Vec<DrugRecord>, StoreError>;
}

/// Image upload with server-side recognition, and stored image retrieval.
pub trait ImageService: Send + Sync {
    /// Upload all images in one request. The service stores each image and
    /// returns its reference with the drugs recognised on it.
    fn upload_images(&self, images: &[ImageBlob]) -> Result<Vec<ExtractionEntry>, StoreError>;

    fn prescription_image(&self, prescription_id: RecordId) -> Result<Vec<u8>, StoreError>;
}
