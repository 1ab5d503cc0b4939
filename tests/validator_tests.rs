//! End-to-end scenarios driven entirely through the public facade, mirroring
//! a handful of representative documents rather than a full R4 core package.

use octofhir_validator::validator::{new_validator, ValidationOptions};

const PATIENT_URL: &str = "http://hl7.org/fhir/StructureDefinition/Patient";
const IPA_PATIENT_URL: &str = "http://hl7.org/fhir/uv/ipa/StructureDefinition/ipa-patient";

fn patient_structure_definition() -> serde_json::Value {
    serde_json::json!({
        "type": "Patient",
        "snapshot": {
            "element": [
                {"id": "Patient", "path": "Patient", "min": 0, "max": "1"},
                {"id": "Patient.identifier", "path": "Patient.identifier", "min": 0, "max": "*", "type": [{"code": "Identifier"}]},
                {"id": "Patient.active", "path": "Patient.active", "min": 0, "max": "1", "type": [{"code": "boolean"}]},
                {"id": "Patient.name", "path": "Patient.name", "min": 0, "max": "*", "type": [{"code": "HumanName"}]},
                {"id": "Patient.deceased[x]", "path": "Patient.deceased[x]", "min": 0, "max": "1", "type": [{"code": "boolean"}, {"code": "dateTime"}]},
            ]
        }
    })
}

fn human_name_structure_definition() -> serde_json::Value {
    serde_json::json!({
        "type": "HumanName",
        "snapshot": {
            "element": [
                {"id": "HumanName", "path": "HumanName", "min": 0, "max": "1"},
                {"id": "HumanName.use", "path": "HumanName.use", "min": 0, "max": "1", "type": [{"code": "code"}]},
                {"id": "HumanName.family", "path": "HumanName.family", "min": 0, "max": "1", "type": [{"code": "string"}]},
                {"id": "HumanName.given", "path": "HumanName.given", "min": 0, "max": "*", "type": [{"code": "string"}]},
            ]
        }
    })
}

fn identifier_structure_definition() -> serde_json::Value {
    serde_json::json!({
        "type": "Identifier",
        "snapshot": {
            "element": [
                {"id": "Identifier", "path": "Identifier", "min": 0, "max": "1"},
                {"id": "Identifier.system", "path": "Identifier.system", "min": 0, "max": "1", "type": [{"code": "uri"}]},
                {"id": "Identifier.value", "path": "Identifier.value", "min": 0, "max": "1", "type": [{"code": "string"}]},
            ]
        }
    })
}

fn ipa_patient_structure_definition() -> serde_json::Value {
    serde_json::json!({
        "type": "Patient",
        "baseDefinition": PATIENT_URL,
        "snapshot": {
            "element": [
                {"id": "Patient", "path": "Patient", "min": 0, "max": "1"},
                {"id": "Patient.identifier", "path": "Patient.identifier", "min": 1, "max": "*", "type": [{"code": "Identifier"}]},
                {"id": "Patient.name", "path": "Patient.name", "min": 0, "max": "*", "type": [{"code": "HumanName"}]},
            ]
        }
    })
}

async fn base_validator() -> octofhir_validator::validator::Validator {
    let mut validator = new_validator(None);

    // Fixture definitions are written to a throwaway directory and loaded
    // through the same `load_files` path a real package install would use.
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in [
        ("patient.json", patient_structure_definition()),
        ("humanname.json", human_name_structure_definition()),
        ("identifier.json", identifier_structure_definition()),
        ("ipa-patient.json", ipa_patient_structure_definition()),
    ] {
        let mut tagged = body;
        tagged["resourceType"] = serde_json::json!("StructureDefinition");
        tagged["url"] = serde_json::json!(match name {
            "patient.json" => PATIENT_URL,
            "humanname.json" => "http://hl7.org/fhir/StructureDefinition/HumanName",
            "identifier.json" => "http://hl7.org/fhir/StructureDefinition/Identifier",
            "ipa-patient.json" => IPA_PATIENT_URL,
            _ => unreachable!(),
        });
        tagged["kind"] = serde_json::json!("resource");
        tagged["status"] = serde_json::json!("active");
        std::fs::write(dir.path().join(name), serde_json::to_string(&tagged).unwrap()).unwrap();
    }

    validator.load_files(&[dir.path().to_path_buf()]).await.unwrap();
    validator
}

#[tokio::test]
async fn minimal_patient_passes() {
    let validator = base_validator().await;
    let document = serde_json::json!({
        "resourceType": "Patient",
        "active": true,
        "name": [{"use": "usual", "family": "Smith", "given": ["John"]}],
    });
    let outcome = validator
        .validate(document, ValidationOptions { profiles: vec![PATIENT_URL.to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(outcome.success, "unexpected errors: {:?}", outcome.errors);
}

#[tokio::test]
async fn two_deceased_fields_is_a_choice_of_type_ambiguity() {
    let validator = base_validator().await;
    let document = serde_json::json!({
        "resourceType": "Patient",
        "active": true,
        "name": [{"use": "usual", "family": "Smith", "given": ["John"]}],
        "deceasedBoolean": true,
        "deceasedDateTime": "2021-01-01T00:00:00Z",
    });
    let outcome = validator
        .validate(document, ValidationOptions { profiles: vec![PATIENT_URL.to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.errors.iter().any(|e| e.contains("only one of")));
}

#[tokio::test]
async fn ipa_patient_without_identifier_fails() {
    let validator = base_validator().await;
    let document = serde_json::json!({
        "resourceType": "Patient",
        "name": [{"use": "usual", "family": "Smith", "given": ["John"]}],
    });
    let outcome = validator
        .validate(document, ValidationOptions { profiles: vec![IPA_PATIENT_URL.to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(!outcome.success);
}

#[tokio::test]
async fn valueset_include_exclude_accepts_and_rejects_expected_codes() {
    let mut validator = new_validator(None);

    let greek = (0..24).map(|i| serde_json::json!({"code": format!("letter{i}")})).collect::<Vec<_>>();
    let mut code_system = serde_json::json!({
        "resourceType": "CodeSystem",
        "url": "http://example.org/CodeSystem/greek",
        "content": "complete",
        "concept": greek,
    });
    code_system["concept"][0]["code"] = serde_json::json!("alpha");
    code_system["concept"][11]["code"] = serde_json::json!("lambda");

    let value_set = serde_json::json!({
        "resourceType": "ValueSet",
        "url": "http://example.org/ValueSet/greek-no-lambda",
        "compose": {
            "include": [{"system": "http://example.org/CodeSystem/greek"}],
            "exclude": [{"system": "http://example.org/CodeSystem/greek", "concept": [{"code": "lambda"}]}],
        }
    });

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cs.json"), serde_json::to_string(&code_system).unwrap()).unwrap();
    std::fs::write(dir.path().join("vs.json"), serde_json::to_string(&value_set).unwrap()).unwrap();
    validator.load_files(&[dir.path().to_path_buf()]).await.unwrap();

    let accepted = validator
        .validate(serde_json::json!("alpha"), ValidationOptions { profiles: vec!["http://example.org/ValueSet/greek-no-lambda".to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(accepted.success);

    let rejected = validator
        .validate(serde_json::json!("lambda"), ValidationOptions { profiles: vec!["http://example.org/ValueSet/greek-no-lambda".to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(!rejected.success);
}

#[tokio::test]
async fn unrecognized_profile_is_reported_unless_ignored() {
    let validator = new_validator(None);
    let outcome = validator
        .validate(serde_json::json!({"resourceType": "Patient"}), ValidationOptions { profiles: vec!["http://example.org/missing".to_string()], ..Default::default() })
        .await
        .unwrap();
    assert!(!outcome.success);
}
