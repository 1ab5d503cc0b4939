use criterion::{criterion_group, criterion_main, Criterion};
use octofhir_validator::compiler::Compiler;
use octofhir_validator::model::{ResourceFile, ResourceStatus, ResourceType, StructureKind};
use octofhir_validator::registry::ResourceRegistry;
use octofhir_validator::runtime::{self, ValidationContext};
use octofhir_validator::toposort::topo_sort;
use std::collections::HashMap;
use std::hint::black_box;
use std::path::PathBuf;
use tokio::runtime::Runtime;

fn synthetic_chain(n: usize) -> HashMap<String, Vec<String>> {
    let mut deps = HashMap::new();
    for i in 0..n {
        let url = format!("http://example.com/Resource{i}");
        let mut edges = Vec::new();
        if i > 0 {
            edges.push(format!("http://example.com/Resource{}", i - 1));
        }
        deps.insert(url, edges);
    }
    deps
}

fn bench_topo_sort(c: &mut Criterion) {
    let deps = synthetic_chain(500);
    c.bench_function("toposort_500_node_chain", |b| {
        b.iter(|| black_box(topo_sort(&deps)))
    });
}

fn patient_structure_definition() -> serde_json::Value {
    serde_json::json!({
        "type": "Patient",
        "snapshot": {
            "element": [
                {"id": "Patient", "path": "Patient", "min": 0, "max": "1"},
                {"id": "Patient.active", "path": "Patient.active", "min": 0, "max": "1", "type": [{"code": "boolean"}]},
                {"id": "Patient.name", "path": "Patient.name", "min": 0, "max": "*", "type": [{"code": "HumanName"}]},
                {"id": "Patient.gender", "path": "Patient.gender", "min": 0, "max": "1", "type": [{"code": "code"}]},
                {"id": "Patient.birthDate", "path": "Patient.birthDate", "min": 0, "max": "1", "type": [{"code": "date"}]},
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
                {"id": "HumanName.family", "path": "HumanName.family", "min": 0, "max": "1", "type": [{"code": "string"}]},
                {"id": "HumanName.given", "path": "HumanName.given", "min": 0, "max": "*", "type": [{"code": "string"}]},
            ]
        }
    })
}

fn file(url: &str, body: serde_json::Value) -> ResourceFile {
    ResourceFile {
        file_path: PathBuf::from(format!("{url}.json")),
        resource_type: ResourceType::StructureDefinition,
        url: url.to_string(),
        name: None,
        kind: Some(StructureKind::Resource),
        base_definition: None,
        date: None,
        status: ResourceStatus::Active,
        experimental: false,
        body,
    }
}

fn bench_nested_patient_validation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut registry = ResourceRegistry::new();
    registry.register(file("http://hl7.org/fhir/StructureDefinition/Patient", patient_structure_definition()));
    registry.register(file("http://hl7.org/fhir/StructureDefinition/HumanName", human_name_structure_definition()));
    let compiled = Compiler::new(&registry).compile_all();

    let patient = serde_json::json!({
        "active": true,
        "name": [
            {"family": "Shepard", "given": ["Jane"]},
            {"family": "Shepard", "given": ["J."]},
        ],
        "gender": "female",
        "birthDate": "2180-04-11",
    });

    let validator = compiled.index.resolve("http://hl7.org/fhir/StructureDefinition/Patient");
    let catalog = octofhir_validator::catalog::BuiltinCatalog::with_defaults();

    c.bench_function("validate_nested_patient_document", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = ValidationContext {
                    index: &compiled.index,
                    hierarchies: &compiled.hierarchies,
                    catalog: &catalog,
                    constraint_evaluator: None,
                };
                let mut issues = Vec::new();
                runtime::validate(&validator, &patient, String::new(), &patient, &ctx, &mut issues).await;
                black_box(issues)
            })
        })
    });
}

criterion_group!(benches, bench_topo_sort, bench_nested_patient_validation);
criterion_main!(benches);
