//! Extraction gateway: images in, per-image drug lists out.
//!
//! One upload request per batch. The batch succeeds or fails as a whole; no
//! retry happens here.

use std::path::PathBuf;

use super::error::ExtractionError;
use crate::models::{ExtractionEntry, ImageBlob};
use crate::store::ImageService;

pub struct ExtractionGateway<'a> {
    service: &'a dyn ImageService,
}

impl<'a> ExtractionGateway<'a> {
    pub fn new(service: &'a dyn ImageService) -> Self {
        Self { service }
    }

    /// Read image files from disk, keeping their order.
    pub fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageBlob>, ExtractionError> {
        paths
            .iter()
            .map(|path| {
                ImageBlob::from_path(path).map_err(|source| ExtractionError::ImageRead {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Extract drug lists from `images`, one entry per image in input order.
    pub fn extract(&self, images: &[ImageBlob]) -> Result<Vec<ExtractionEntry>, ExtractionError> {
        if images.is_empty() {
            tracing::debug!("No images to extract, skipping upload");
            return Ok(Vec::new());
        }

        let entries = self.service.upload_images(images)?;

        if entries.len() != images.len() {
            return Err(ExtractionError::CountMismatch {
                expected: images.len(),
                got: entries.len(),
            });
        }
        validate(&entries)?;

        tracing::info!(
            images = images.len(),
            drugs = entries.iter().map(|e| e.drugs.len()).sum::<usize>(),
            "Prescription images extracted"
        );
        Ok(entries)
    }
}

fn validate(entries: &[ExtractionEntry]) -> Result<(), ExtractionError> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.image_url.trim().is_empty() {
            return Err(ExtractionError::Malformed(format!(
                "entry {i} has no image reference"
            )));
        }
        if let Some(j) = entry.drugs.iter().position(|d| d.name.trim().is_empty()) {
            return Err(ExtractionError::Malformed(format!(
                "entry {i} drug {j} has no name"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDrug;
    use crate::store::{InMemoryRecordStore, StoreError};

    fn images(n: usize) -> Vec<ImageBlob> {
        (0..n).map(|i| ImageBlob::new(&format!("rx{i}.jpg"), vec![i as u8])).collect()
    }

    #[test]
    fn returns_one_entry_per_image_in_order() {
        let store = InMemoryRecordStore::new();
        store.queue_recognition(Ok(vec![
            ExtractionEntry::new("/media/rx0.jpg", vec![RawDrug::named("Amoxicillin")]),
            ExtractionEntry::new("/media/rx1.jpg", vec![]),
        ]));

        let entries = ExtractionGateway::new(&store).extract(&images(2)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].drugs[0].name, "Amoxicillin");
        assert_eq!(entries[1].image_file_name(), "rx1.jpg");
    }

    #[test]
    fn empty_batch_makes_no_call() {
        let store = InMemoryRecordStore::new();
        let entries = ExtractionGateway::new(&store).extract(&[]).unwrap();
        assert!(entries.is_empty());
        assert_eq!(store.upload_calls(), 0);
    }

    #[test]
    fn unreachable_service_fails_whole_batch() {
        let store = InMemoryRecordStore::new();
        store.queue_recognition(Err(StoreError::Connection("http://localhost:8000".into())));
        let err = ExtractionGateway::new(&store).extract(&images(3)).unwrap_err();
        assert!(matches!(err, ExtractionError::Upload(StoreError::Connection(_))));
    }

    #[test]
    fn short_response_is_count_mismatch() {
        let store = InMemoryRecordStore::new();
        store.queue_recognition(Ok(vec![ExtractionEntry::new("/media/rx0.jpg", vec![])]));
        let err = ExtractionGateway::new(&store).extract(&images(2)).unwrap_err();
        assert!(matches!(err, ExtractionError::CountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn blank_drug_name_is_malformed() {
        let store = InMemoryRecordStore::new();
        store.queue_recognition(Ok(vec![ExtractionEntry::new(
            "/media/rx0.jpg",
            vec![RawDrug::named("Ibuprofen"), RawDrug::named("  ")],
        )]));
        let err = ExtractionGateway::new(&store).extract(&images(1)).unwrap_err();
        assert_eq!(err.to_string(), "Malformed recognition output: entry 0 drug 1 has no name");
    }

    #[test]
    fn load_images_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.jpg");
        std::fs::write(&good, b"jpeg").unwrap();
        let missing = dir.path().join("b.jpg");

        let loaded = ExtractionGateway::load_images(&[good.clone()]).unwrap();
        assert_eq!(loaded[0].file_name, "a.jpg");

        let err = ExtractionGateway::load_images(&[good, missing.clone()]).unwrap_err();
        assert!(matches!(err, ExtractionError::ImageRead { ref path, .. } if *path == missing));
    }
}
