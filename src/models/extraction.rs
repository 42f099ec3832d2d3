use serde::{Deserialize, Serialize};

use super::file_name_of;

/// Drug fields as the recognition service returns them. Only the name is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDrug {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "DOSAGE", default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(rename = "STRENGTH", default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(rename = "FREQUENCY", default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(rename = "DURATION", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl RawDrug {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dosage: None,
            strength: None,
            frequency: None,
            duration: None,
        }
    }

    pub fn with_dosage(mut self, dosage: &str) -> Self {
        self.dosage = Some(dosage.to_string());
        self
    }
}

/// Extraction result for one uploaded image. Lives only in staging; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    pub image_url: String,
    #[serde(rename = "prescription_data", default)]
    pub drugs: Vec<RawDrug>,
}

impl ExtractionEntry {
    pub fn new(image_url: &str, drugs: Vec<RawDrug>) -> Self {
        Self {
            image_url: image_url.to_string(),
            drugs,
        }
    }

    pub fn image_file_name(&self) -> &str {
        file_name_of(&self.image_url)
    }
}
