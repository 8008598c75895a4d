// 📨 Request / response shapes and ingestion-time normalization
//
// Input field names follow the public contract; the legacy Spanish names
// are accepted as aliases so existing callers keep working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::project::{ProjectCode, ProjectCodePattern};

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Trim, lowercase and collapse inner whitespace.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Replace Spanish accented vowels (and ñ/ü) with their plain forms.
pub fn fold_accents(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'Á' | 'À' | 'Ä' => 'A',
            'É' | 'È' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Optional text that is present and not blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// CATEGORY
// ============================================================================

const COMPANY_CATEGORIES: &[&str] = &["empresa", "company"];
const VEHICLE_CATEGORIES: &[&str] = &["vehiculo", "vehiculos", "vehicle", "vehicles"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Company,
    Person,
    Vehicle,
}

impl Category {
    /// Case, whitespace and accent insensitive. Anything unrecognised is a person.
    pub fn parse(raw: &str) -> Self {
        let key = fold_accents(&normalize(raw));
        if COMPANY_CATEGORIES.contains(&key.as_str()) {
            Category::Company
        } else if VEHICLE_CATEGORIES.contains(&key.as_str()) {
            Category::Vehicle
        } else {
            Category::Person
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Company => "company",
            Category::Person => "person",
            Category::Vehicle => "vehicle",
        }
    }
}

// ============================================================================
// ASSIGNMENT REQUEST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignFolderRequest {
    #[serde(alias = "codigo_proyecto")]
    pub project_code: String,

    #[serde(default, alias = "id_proyecto")]
    pub project_id: Option<i64>,

    #[serde(alias = "registros")]
    pub records: Vec<RecordRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub id: i64,

    #[serde(alias = "categoria_requerimiento")]
    pub category: String,

    #[serde(default, alias = "empresa_acreditacion")]
    pub company_name: String,

    #[serde(default, alias = "nombre_trabajador")]
    pub person_name: Option<String>,

    #[serde(default, alias = "patente_vehiculo")]
    pub plate: Option<String>,
}

/// A record after validation: category parsed, blanks dropped, text trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub id: i64,
    pub category: Category,
    pub raw_category: String,
    pub company_name: String,
    pub person_name: Option<String>,
    pub plate: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub project_code: ProjectCode,
    pub project_id: Option<i64>,
    pub records: Vec<InputRecord>,
}

impl AssignFolderRequest {
    /// Check every record and collect all problems before touching any
    /// remote service.
    pub fn validate(&self, code_pattern: &ProjectCodePattern) -> Result<ValidatedRequest, ValidationError> {
        let mut problems = Vec::new();

        let project_code: Option<ProjectCode> = match code_pattern.parse(self.project_code.trim()) {
            Ok(code) => Some(code),
            Err(e) => {
                problems.extend(e.problems);
                None
            }
        };

        let mut records = Vec::with_capacity(self.records.len());
        let mut needs_project_id = false;

        for (index, record) in self.records.iter().enumerate() {
            let category = Category::parse(&record.category);
            let person_name = present(&record.person_name).map(str::to_string);
            let plate = present(&record.plate).map(str::to_string);

            if category == Category::Company && record.company_name.trim().is_empty() {
                problems.push(format!(
                    "records[{}] (id {}): company_name is required for category '{}'",
                    index, record.id, record.category
                ));
            }
            if category != Category::Company && category != Category::Vehicle && person_name.is_none() {
                problems.push(format!(
                    "records[{}] (id {}): person_name is required for category '{}'",
                    index, record.id, record.category
                ));
            }
            if category == Category::Vehicle && plate.is_none() {
                problems.push(format!(
                    "records[{}] (id {}): plate is required for category '{}'",
                    index, record.id, record.category
                ));
            }
            if category == Category::Vehicle || plate.is_some() {
                needs_project_id = true;
            }

            records.push(InputRecord {
                id: record.id,
                category,
                raw_category: record.category.clone(),
                company_name: record.company_name.trim().to_string(),
                person_name,
                plate,
            });
        }

        if needs_project_id && self.project_id.is_none() {
            problems.push(
                "project_id is required when a record is a vehicle or carries a plate".to_string(),
            );
        }

        match project_code {
            Some(project_code) if problems.is_empty() => Ok(ValidatedRequest {
                project_code,
                project_id: self.project_id,
                records,
            }),
            _ => Err(ValidationError { problems }),
        }
    }
}

// ============================================================================
// ASSIGNMENT RESPONSE
// ============================================================================

/// Which lookup produced a record's folder id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderSource {
    CompanyFolder,
    PersistedWorker,
    PersistedDriver,
    PersistedVehicle,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub id: i64,
    pub person_name: Option<String>,
    pub folder_id_worker: Option<String>,
    pub folder_id_driver: Option<String>,
    pub folder_id_vehicle: Option<String>,
    pub folder_id_final: Option<String>,
    pub source: FolderSource,
    pub updated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unresolved: usize,
}

impl Summary {
    pub fn message(&self) -> String {
        if self.succeeded == self.total {
            "All records were updated successfully".to_string()
        } else if self.succeeded > 0 {
            format!("Updated {} of {} records", self.succeeded, self.total)
        } else if self.unresolved > 0 {
            format!("No folder id found for {} record(s)", self.unresolved)
        } else {
            "No record could be updated".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignFolderResponse {
    pub project_code: String,
    pub parent_container_id: Option<String>,
    pub records: Vec<RecordOutcome>,
    pub summary: Summary,
    pub message: String,
    pub processed_at: DateTime<Utc>,
}

// ============================================================================
// ROSTERS (folder provisioning)
// ============================================================================

/// A person or vehicle as callers send it: either a bare name or an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Named {
        #[serde(default)]
        id: Option<i64>,
        #[serde(alias = "nombre")]
        name: String,
    },
    PlainName(String),
}

impl EntityRef {
    pub fn into_entry(self) -> RosterEntry {
        match self {
            EntityRef::Named { id, name } => RosterEntry {
                id,
                name: name.trim().to_string(),
                folder_id: None,
            },
            EntityRef::PlainName(name) => RosterEntry {
                id: None,
                name: name.trim().to_string(),
                folder_id: None,
            },
        }
    }
}

/// Canonical roster item; `folder_id` is filled in by provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterRequest {
    #[serde(default, alias = "especialistas")]
    pub specialists: Vec<EntityRef>,
    #[serde(default, alias = "conductores")]
    pub drivers: Vec<EntityRef>,
    #[serde(default, alias = "vehiculos")]
    pub vehicles: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRosterRequest {
    #[serde(alias = "empresa")]
    pub company: String,
    #[serde(flatten)]
    pub roster: RosterRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub specialists: Vec<RosterEntry>,
    pub drivers: Vec<RosterEntry>,
    pub vehicles: Vec<RosterEntry>,
}

impl From<RosterRequest> for Roster {
    fn from(request: RosterRequest) -> Self {
        let convert = |items: Vec<EntityRef>| -> Vec<RosterEntry> {
            items
                .into_iter()
                .map(EntityRef::into_entry)
                .filter(|entry| !entry.name.is_empty())
                .collect()
        };
        Roster {
            specialists: convert(request.specialists),
            drivers: convert(request.drivers),
            vehicles: convert(request.vehicles),
        }
    }
}

impl Roster {
    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty() && self.drivers.is_empty() && self.vehicles.is_empty()
    }

    /// Groups in folder order: specialists, drivers, vehicles.
    pub fn groups_mut(&mut self) -> [&mut Vec<RosterEntry>; 3] {
        [&mut self.specialists, &mut self.drivers, &mut self.vehicles]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    #[serde(alias = "codigo_proyecto")]
    pub project_code: String,
    #[serde(default, alias = "myma")]
    pub internal: RosterRequest,
    #[serde(default, alias = "externo")]
    pub external: Option<ExternalRosterRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, category: &str, person: Option<&str>, plate: Option<&str>) -> RecordRequest {
        RecordRequest {
            id,
            category: category.to_string(),
            company_name: "AGQ".to_string(),
            person_name: person.map(str::to_string),
            plate: plate.map(str::to_string),
        }
    }

    fn my() -> ProjectCodePattern {
        ProjectCodePattern::new("MY")
    }

    fn request(project_id: Option<i64>, records: Vec<RecordRequest>) -> AssignFolderRequest {
        AssignFolderRequest {
            project_code: "MY-000-2026".to_string(),
            project_id,
            records,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  My   Ma "), "my ma");
        assert_eq!(normalize("MYMA"), "myma");
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Acreditación"), "Acreditacion");
        assert_eq!(fold_accents("VEHÍCULO"), "VEHICULO");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse(" Empresa "), Category::Company);
        assert_eq!(Category::parse("EMPRESA"), Category::Company);
        assert_eq!(Category::parse("Vehículo"), Category::Vehicle);
        assert_eq!(Category::parse("vehiculos"), Category::Vehicle);
        assert_eq!(Category::parse("Vehicle"), Category::Vehicle);
        assert_eq!(Category::parse("Trabajador"), Category::Person);
        assert_eq!(Category::parse("Conductor"), Category::Person);
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        let req = request(
            Some(7),
            vec![
                record(1, "Empresa", None, None),
                record(2, "Trabajador", Some(" Alan Flores "), None),
                record(3, "Vehiculo", None, Some(" ABCD12 ")),
            ],
        );

        let validated = req.validate(&my()).unwrap();
        assert_eq!(validated.project_code.year(), "2026");
        assert_eq!(validated.records[1].person_name.as_deref(), Some("Alan Flores"));
        assert_eq!(validated.records[2].plate.as_deref(), Some("ABCD12"));
    }

    #[test]
    fn test_validate_rejects_bad_project_code() {
        let mut req = request(None, vec![]);
        req.project_code = "INVALID-CODE".to_string();
        let err = req.validate(&my()).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("INVALID-CODE"));
    }

    #[test]
    fn test_validate_requires_person_name() {
        let req = request(None, vec![record(5, "Trabajador", Some("   "), None)]);
        let err = req.validate(&my()).unwrap_err();
        assert!(err.problems[0].contains("person_name"));
    }

    #[test]
    fn test_validate_company_requires_company_name() {
        let mut blank = record(1, "Empresa", None, None);
        blank.company_name = "   ".to_string();
        let err = request(None, vec![blank]).validate(&my()).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("company_name"));
        assert!(err.problems[0].contains("id 1"));

        // field left out entirely
        let json = r#"{"project_code": "MY-000-2026", "records": [{"id": 1, "category": "Empresa"}]}"#;
        let missing: AssignFolderRequest = serde_json::from_str(json).unwrap();
        let err = missing.validate(&my()).unwrap_err();
        assert!(err.problems[0].contains("company_name"));
    }

    #[test]
    fn test_validate_vehicle_needs_plate_and_project_id() {
        let req = request(None, vec![record(9, "Vehiculo", None, None)]);
        let err = req.validate(&my()).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert!(err.problems.iter().any(|p| p.contains("plate")));
        assert!(err.problems.iter().any(|p| p.contains("project_id")));
    }

    #[test]
    fn test_validate_plate_on_person_needs_project_id() {
        let req = request(None, vec![record(4, "Conductor", Some("Diego"), Some("XY1234"))]);
        let err = req.validate(&my()).unwrap_err();
        assert!(err.problems[0].contains("project_id"));

        let ok = request(Some(3), vec![record(4, "Conductor", Some("Diego"), Some("XY1234"))]);
        assert!(ok.validate(&my()).is_ok());
    }

    #[test]
    fn test_spanish_aliases_deserialize() {
        let json = r#"{
            "codigo_proyecto": "MY-000-2026",
            "id_proyecto": 12,
            "registros": [{
                "id": 1,
                "categoria_requerimiento": "Empresa",
                "empresa_acreditacion": "Myma",
                "nombre_trabajador": "Alan Flores"
            }]
        }"#;
        let req: AssignFolderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.project_id, Some(12));
        assert_eq!(req.records[0].company_name, "Myma");
        assert_eq!(req.records[0].person_name.as_deref(), Some("Alan Flores"));
    }

    #[test]
    fn test_summary_messages() {
        let all = Summary { total: 2, succeeded: 2, failed: 0, unresolved: 0 };
        assert_eq!(all.message(), "All records were updated successfully");

        let some = Summary { total: 3, succeeded: 1, failed: 1, unresolved: 1 };
        assert_eq!(some.message(), "Updated 1 of 3 records");

        let none_found = Summary { total: 2, succeeded: 0, failed: 0, unresolved: 2 };
        assert_eq!(none_found.message(), "No folder id found for 2 record(s)");

        let failed = Summary { total: 1, succeeded: 0, failed: 1, unresolved: 0 };
        assert_eq!(failed.message(), "No record could be updated");
    }

    #[test]
    fn test_entity_ref_both_shapes() {
        let json = r#"["Pedrito", {"id": 192, "nombre": " Alan Flores "}, {"name": "Diego"}]"#;
        let refs: Vec<EntityRef> = serde_json::from_str(json).unwrap();
        let entries: Vec<RosterEntry> = refs.into_iter().map(EntityRef::into_entry).collect();

        assert_eq!(entries[0], RosterEntry { id: None, name: "Pedrito".into(), folder_id: None });
        assert_eq!(entries[1].id, Some(192));
        assert_eq!(entries[1].name, "Alan Flores");
        assert_eq!(entries[2].name, "Diego");
    }

    #[test]
    fn test_provision_request_aliases() {
        let json = r#"{
            "codigo_proyecto": "MY-000-2026",
            "myma": {"especialistas": [{"id": 192, "nombre": "Alan Flores"}], "conductores": [], "vehiculos": []},
            "externo": {"empresa": "AGQ", "conductores": ["Diego"]}
        }"#;
        let req: ProvisionRequest = serde_json::from_str(json).unwrap();
        let external = req.external.unwrap();
        assert_eq!(external.company, "AGQ");
        assert_eq!(external.roster.drivers.len(), 1);
        assert_eq!(req.internal.specialists.len(), 1);

        let roster = Roster::from(req.internal);
        assert!(!roster.is_empty());
        assert_eq!(roster.specialists[0].id, Some(192));
    }
}
