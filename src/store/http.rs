use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ImageService, RecordStore, StoreError};
use crate::config::ClientConfig;
use crate::models::*;

/// Blocking HTTP client for the remote record store.
pub struct HttpRecordStore {
    base_url: String,
    client: Client,
    timeout_secs: u64,
}

impl HttpRecordStore {
    pub fn new(config: &ClientConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        request.send().map_err(|e| {
            if e.is_connect() {
                StoreError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                StoreError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                StoreError::Http(e.to_string())
            }
        })
    }

    /// Send and map non-2xx statuses. A 404 becomes `NotFound` when the
    /// request addressed a single record.
    fn execute(
        &self,
        request: RequestBuilder,
        target: Option<(&'static str, RecordId)>,
    ) -> Result<Response, StoreError> {
        let response = self.send(request)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some((collection, id)) = target {
                return Err(StoreError::NotFound { collection, id });
            }
        }
        let body = response.text().unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: Option<(&'static str, RecordId)>,
    ) -> Result<T, StoreError> {
        self.execute(request, target)?
            .json()
            .map_err(|e| StoreError::ResponseParsing(e.to_string()))
    }
}

/// Response body of `POST /upload-multiple-images/`
#[derive(Deserialize)]
struct UploadResponse {
    d_info: Vec<ExtractionEntry>,
}

impl RecordStore for HttpRecordStore {
    fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.fetch(self.client.get(self.url("patients/")), None)
    }

    fn get_patient(&self, id: RecordId) -> Result<Patient, StoreError> {
        self.fetch(
            self.client.get(self.url(&format!("patients/{id}/"))),
            Some(("patients", id)),
        )
    }

    fn create_patient(&self, fields: &PatientFields) -> Result<Patient, StoreError> {
        self.fetch(self.client.post(self.url("patients/")).json(fields), None)
    }

    fn update_patient(&self, id: RecordId, fields: &PatientFields) -> Result<Patient, StoreError> {
        self.fetch(
            self.client.put(self.url(&format!("patients/{id}/"))).json(fields),
            Some(("patients", id)),
        )
    }

    fn delete_patient(&self, id: RecordId) -> Result<(), StoreError> {
        self.execute(
            self.client.delete(self.url(&format!("patients/{id}/"))),
            Some(("patients", id)),
        )?;
        Ok(())
    }

    fn create_prescription(&self, new: &NewPrescription) -> Result<Prescription, StoreError> {
        self.fetch(self.client.post(self.url("prescriptions/")).json(new), None)
    }

    fn prescriptions_for_patient(
        &self,
        patient_id: RecordId,
    ) -> Result<Vec<Prescription>, StoreError> {
        self.fetch(
            self.client
                .get(self.url(&format!("prescriptions/patient/{patient_id}/"))),
            None,
        )
    }

    fn create_drug_record(&self, new: &NewDrugRecord) -> Result<DrugRecord, StoreError> {
        self.fetch(self.client.post(self.url("druginformation/")).json(new), None)
    }

    fn drugs_for_prescription(
        &self,
        prescription_id: RecordId,
    ) -> Result<Vec<DrugRecord>, StoreError> {
        self.fetch(
            self.client.get(
                self.url(&format!("druginformation/prescription/{prescription_id}/")),
            ),
            None,
        )
    }
}

impl ImageService for HttpRecordStore {
    fn upload_images(&self, images: &[ImageBlob]) -> Result<Vec<ExtractionEntry>, StoreError> {
        let mut form = Form::new();
        for image in images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type())
                .map_err(|e| StoreError::Http(e.to_string()))?;
            form = form.part("images", part);
        }

        let parsed: UploadResponse = self.fetch(
            self.client
                .post(self.url("upload-multiple-images/"))
                .multipart(form),
            None,
        )?;
        Ok(parsed.d_info)
    }

    fn prescription_image(&self, prescription_id: RecordId) -> Result<Vec<u8>, StoreError> {
        let response = self.execute(
            self.client
                .get(self.url(&format!("prescriptions/image/{prescription_id}/"))),
            Some(("prescriptions", prescription_id)),
        )?;
        let bytes = response
            .bytes()
            .map_err(|e| StoreError::ResponseParsing(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
