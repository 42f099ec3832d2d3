use serde::{Deserialize, Deserializer, Serialize};

use super::{RawDrug, RecordId};

/// Marker stored and displayed for an optional drug field the extraction did not provide.
pub const UNKNOWN_FIELD: &str = "N/A";

/// One drug line persisted under a prescription.
///
/// Optional fields are never empty: a missing, null or blank value is
/// replaced with [`UNKNOWN_FIELD`] on the way in and on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub id: RecordId,
    #[serde(rename = "prescription")]
    pub prescription_id: RecordId,
    #[serde(rename = "drug_name")]
    pub name: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub dosage: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub strength: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub frequency: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_blank")]
    pub duration: String,
}

/// Request body for creating a drug record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDrugRecord {
    #[serde(rename = "prescription")]
    pub prescription_id: RecordId,
    #[serde(rename = "drug_name")]
    pub name: String,
    pub dosage: String,
    pub strength: String,
    pub frequency: String,
    pub duration: String,
}

impl NewDrugRecord {
    /// Build the record for `raw` under an existing prescription.
    pub fn from_raw(prescription_id: RecordId, raw: &RawDrug) -> Self {
        Self {
            prescription_id,
            name: raw.name.trim().to_string(),
            dosage: or_unknown(raw.dosage.as_deref()),
            strength: or_unknown(raw.strength.as_deref()),
            frequency: or_unknown(raw.frequency.as_deref()),
            duration: or_unknown(raw.duration.as_deref()),
        }
    }

    pub fn into_record(self, id: RecordId) -> DrugRecord {
        DrugRecord {
            id,
            prescription_id: self.prescription_id,
            name: self.name,
            dosage: self.dosage,
            strength: self.strength,
            frequency: self.frequency,
            duration: self.duration,
        }
    }
}

pub(crate) fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_FIELD.to_string(),
    }
}

fn unknown() -> String {
    UNKNOWN_FIELD.to_string()
}

fn unknown_if_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(or_unknown(value.as_deref()))
}
