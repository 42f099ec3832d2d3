use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{file_name_of, RecordId};

/// A stored prescription image owned by one patient. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: RecordId,
    #[serde(rename = "patient")]
    pub patient_id: RecordId,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn image_file_name(&self) -> &str {
        file_name_of(&self.image_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrescription {
    #[serde(rename = "patient")]
    pub patient_id: RecordId,
    pub image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_file_name_is_last_segment() {
        let json = r#"{"id": 3, "patient": 7,
            "image_url": "http://localhost:8000/media/rx/scan_01.jpg",
            "created_at": "2024-03-01T08:15:00Z"}"#;
        let rx: Prescription = serde_json::from_str(json).unwrap();
        assert_eq!(rx.patient_id, 7);
        assert_eq!(rx.image_file_name(), "scan_01.jpg");
    }

    #[test]
    fn new_prescription_uses_patient_key() {
        let body = NewPrescription { patient_id: 7, image_url: "a.jpg".into() };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"patient": 7, "image_url": "a.jpg"}));
    }
}
