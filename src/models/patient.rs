use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub name: String,
    pub age: u32,
    pub address: String,
    #[serde(rename = "phone_number")]
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Editable patient fields, sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientFields {
    pub name: String,
    pub age: u32,
    pub address: String,
    #[serde(rename = "phone_number")]
    pub phone: String,
    pub email: String,
}

impl Patient {
    pub fn fields(&self) -> PatientFields {
        PatientFields {
            name: self.name.clone(),
            age: self.age,
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}
