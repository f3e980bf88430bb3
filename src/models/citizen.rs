//! Citizen identity and contact record

use serde::{Deserialize, Serialize};

use crate::db::Collection;
use crate::models::Entity;

fn default_state() -> String {
    "Karnataka".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CitizenStatus {
    #[default]
    Active,
    Inactive,
}

/// Citizen record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citizen {
    /// Native id of the engine that stored this copy
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    /// Generated on registration, immutable afterwards
    pub citizen_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_kannada: Option<String>,
    /// National id number; not unique across engines
    #[serde(default)]
    pub aadhaar_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_kannada: Option<String>,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub status: CitizenStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewCitizen {
    pub name: String,
    #[serde(default)]
    pub name_kannada: Option<String>,
    #[serde(default)]
    pub aadhaar_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address_kannada: Option<String>,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl Citizen {
    /// Build a new active citizen; timestamps are filled in by the store
    pub fn new(citizen_id: String, input: NewCitizen) -> Self {
        Self {
            native_id: None,
            citizen_id,
            name: input.name,
            name_kannada: input.name_kannada,
            aadhaar_number: input.aadhaar_number,
            phone_number: input.phone_number,
            email: input.email,
            date_of_birth: input.date_of_birth,
            gender: input.gender,
            address: input.address,
            address_kannada: input.address_kannada,
            district: input.district,
            pincode: input.pincode,
            state: input.state.unwrap_or_else(default_state),
            status: CitizenStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

impl Entity for Citizen {
    const COLLECTION: Collection = Collection::Citizens;

    fn logical_id(&self) -> &str {
        &self.citizen_id
    }
}

/// Profile edit; only the fields that are set change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitizenUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_kannada: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aadhaar_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_kannada: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CitizenStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_citizen_defaults() {
        let input: NewCitizen = serde_json::from_value(json!({
            "name": "Asha",
            "email": "asha@example.in",
            "gender": "female",
        }))
        .unwrap();
        let citizen = Citizen::new("CIT1".into(), input);

        assert_eq!(citizen.state, "Karnataka");
        assert_eq!(citizen.status, CitizenStatus::Active);
        assert_eq!(citizen.gender, Gender::Female);
    }

    #[test]
    fn test_record_skips_absent_optionals() {
        let citizen = Citizen::new(
            "CIT1".into(),
            serde_json::from_value(json!({ "name": "Asha" })).unwrap(),
        );
        let record = citizen.to_record().unwrap();
        assert!(!record.contains_key("_id"));
        assert!(!record.contains_key("name_kannada"));
        assert_eq!(record["status"], json!("active"));

        let back = Citizen::from_record(record).unwrap();
        assert_eq!(back, citizen);
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = CitizenUpdate {
            district: Some("Mandya".into()),
            ..Default::default()
        };
        let record = crate::models::to_record(&update).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record["district"], json!("Mandya"));
    }
}
