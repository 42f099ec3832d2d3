//! Download of stored prescription images.
//!
//! Every call fetches from the record store again; nothing is cached locally.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{Prescription, RecordId};
use crate::store::{ImageService, StoreError};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct PrescriptionImages<'a> {
    service: &'a dyn ImageService,
}

impl<'a> PrescriptionImages<'a> {
    pub fn new(service: &'a dyn ImageService) -> Self {
        Self { service }
    }

    pub fn download(&self, prescription_id: RecordId) -> Result<Vec<u8>, StoreError> {
        self.service.prescription_image(prescription_id)
    }

    /// Write the image into `dir` under its stored file name, overwriting any
    /// earlier download of the same file.
    pub fn save_to(&self, prescription: &Prescription, dir: &Path) -> Result<PathBuf, ImageError> {
        let bytes = self.download(prescription.id)?;

        let file_name = match prescription.image_file_name() {
            "" => format!("prescription-{}", prescription.id),
            name => name.to_string(),
        };
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, &bytes)?;

        tracing::debug!(
            prescription_id = prescription.id,
            size = bytes.len(),
            "Prescription image saved"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use chrono::Utc;

    fn prescription(id: RecordId, image_url: &str) -> Prescription {
        Prescription {
            id,
            patient_id: 7,
            image_url: image_url.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn saves_under_stored_file_name() {
        let store = InMemoryRecordStore::new();
        store.put_image(3, b"jpeg bytes".to_vec());
        let dir = tempfile::tempdir().unwrap();

        let path = PrescriptionImages::new(&store)
            .save_to(&prescription(3, "/media/rx/scan_03.jpg"), &dir.path().join("downloads"))
            .unwrap();

        assert!(path.ends_with("downloads/scan_03.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn repeated_download_overwrites() {
        let store = InMemoryRecordStore::new();
        let images = PrescriptionImages::new(&store);
        let dir = tempfile::tempdir().unwrap();
        let rx = prescription(3, "/media/rx/");

        store.put_image(3, b"v1".to_vec());
        let first = images.save_to(&rx, dir.path()).unwrap();
        store.put_image(3, b"v2".to_vec());
        let second = images.save_to(&rx, dir.path()).unwrap();

        assert_eq!(first, second);
        assert!(second.ends_with("prescription-3"));
        assert_eq!(std::fs::read(&second).unwrap(), b"v2");
    }

    #[test]
    fn missing_image_is_store_error() {
        let store = InMemoryRecordStore::new();
        let err = PrescriptionImages::new(&store).download(9).unwrap_err();
        assert_eq!(err, StoreError::NotFound { collection: "prescriptions", id: 9 });
    }
}
