//! Incremental indexing of FML sources and completion over indexed definitions.

use mapbuilder_definitions::{
    build_tree, DefinitionEntity, DefinitionSet, FlatElement, IgConfig,
};
use mapbuilder_fml::{resolve_completions, Role, SourceIndexer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const PATIENT_MAP: &str = "\
map \"http://example.org/fhir/StructureMap/PatientToBundle\" = \"PatientToBundle\"

uses \"http://hl7.org/fhir/StructureDefinition/Patient\" alias Patient as source
uses \"http://hl7.org/fhir/StructureDefinition/Bundle\" alias Bundle as target

group PatientToBundle(source src : Patient, target tgt : Bundle) {
  src.name as n -> tgt.entry as e;
}
";

const LOCAL_MAP: &str = "\
uses \"http://example.org/fhir/StructureDefinition/LocalPatient\" alias LocalPatient as source

group Local(source src : LocalPatient) {
}
";

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn definitions() -> DefinitionSet {
    let patient = DefinitionEntity {
        canonical_url: "http://hl7.org/fhir/StructureDefinition/Patient".into(),
        source_package_id: "hl7.fhir.r4.core".into(),
        source_version: "4.0.1".into(),
        fhir_type: "Patient".into(),
        elements: build_tree(&[
            FlatElement::new("Patient", "*"),
            FlatElement::new("Patient.name", "*").with_types(&["HumanName"]),
            FlatElement::new("Patient.deceased[x]", "1").with_types(&["boolean", "dateTime"]),
            FlatElement::new("Patient.contact", "0"),
        ]),
    };
    let ig = IgConfig {
        canonical: "http://example.org/fhir".into(),
        id: "example.ig".into(),
        ..IgConfig::default()
    };
    DefinitionSet::new(
        &ig,
        HashMap::from([(patient.canonical_url.clone(), patient)]),
    )
}

#[test]
fn test_scan_binds_group_names_to_uses_aliases() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("maps/patient.fml");
    write(&file, PATIENT_MAP);

    let mut indexer = SourceIndexer::new();
    assert_eq!(indexer.scan_all(&[project.path()]), 1);

    let bindings = indexer.bindings(&file).unwrap();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].role, Role::Source);
    assert_eq!(bindings[0].bound_name.as_deref(), Some("src"));
    assert_eq!(bindings[1].role, Role::Target);
    assert_eq!(bindings[1].bound_name.as_deref(), Some("tgt"));
}

#[test]
fn test_unchanged_content_is_not_reparsed() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("patient.fml");
    write(&file, PATIENT_MAP);

    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[project.path()]);
    let before = indexer.bindings(&file).unwrap();

    assert_eq!(indexer.file_changed(&file).unwrap(), 0);
    assert!(Arc::ptr_eq(&before, &indexer.bindings(&file).unwrap()));

    // One byte different: alias no longer matches the group parameter type.
    write(&file, &PATIENT_MAP.replace("src : Patient", "src : Patiend"));
    assert_eq!(indexer.file_changed(&file).unwrap(), 1);
    let after = indexer.bindings(&file).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after[0].bound_name, None);
    assert_ne!(
        indexer.entry(&file).unwrap().content_hash,
        mapbuilder_fml::content_hash(PATIENT_MAP.as_bytes())
    );
}

#[test]
fn test_created_directory_indexes_nested_files() {
    let project = tempfile::tempdir().unwrap();
    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[project.path()]);
    assert!(indexer.is_empty());

    let dir = project.path().join("new-maps");
    write(&dir.join("a.fml"), PATIENT_MAP);
    write(&dir.join("deeper/b.fml"), LOCAL_MAP);
    write(&dir.join("readme.md"), "not a map");

    assert_eq!(indexer.file_changed(&dir).unwrap(), 2);
    assert_eq!(indexer.len(), 2);
}

#[test]
fn test_deleting_a_directory_removes_only_nested_entries() {
    let project = tempfile::tempdir().unwrap();
    let maps = project.path().join("maps");
    write(&maps.join("a.fml"), PATIENT_MAP);
    write(&maps.join("sub/b.fml"), LOCAL_MAP);
    write(&project.path().join("maps-extra/c.fml"), PATIENT_MAP);
    write(&project.path().join("top.fml"), LOCAL_MAP);

    let mut indexer = SourceIndexer::new();
    assert_eq!(indexer.scan_all(&[project.path()]), 4);

    std::fs::remove_dir_all(&maps).unwrap();
    assert_eq!(indexer.file_deleted(&maps), 2);
    assert_eq!(indexer.len(), 2);
    assert!(indexer
        .bindings(&project.path().join("maps-extra/c.fml"))
        .is_some());

    assert_eq!(indexer.file_deleted(&project.path().join("top.fml")), 1);
    assert_eq!(indexer.file_deleted(&project.path().join("top.fml")), 0);
}

#[test]
fn test_full_scan_discards_previous_state() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write(&first.path().join("a.fml"), PATIENT_MAP);
    write(&second.path().join("b.fml"), LOCAL_MAP);

    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[first.path()]);
    indexer.scan_all(&[second.path()]);
    assert_eq!(indexer.len(), 1);
    assert!(indexer.bindings(&first.path().join("a.fml")).is_none());
}

#[test]
fn test_completion_lists_children_of_bound_structure() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("patient.fml");
    write(&file, PATIENT_MAP);
    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[project.path()]);
    let bindings = indexer.bindings(&file).unwrap();
    let definitions = definitions();

    let completions = resolve_completions(&bindings, "  src.", &definitions);
    let labels: Vec<&str> = completions.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["name", "deceased"]);
    assert_eq!(completions[1].detail.as_deref(), Some("boolean | dateTime"));

    // Bundle is neither indexed nor in the IG namespace.
    assert!(resolve_completions(&bindings, "  src.name -> tgt.", &definitions).is_empty());
    assert!(resolve_completions(&bindings, "  src", &definitions).is_empty());
    assert!(resolve_completions(&bindings, "  other.", &definitions).is_empty());
}

#[test]
fn test_unbuilt_ig_structure_gets_advisory() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("local.fml");
    write(&file, LOCAL_MAP);
    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[project.path()]);
    let bindings = indexer.bindings(&file).unwrap();

    let completions = resolve_completions(&bindings, "src.", &definitions());
    assert_eq!(completions.len(), 1);
    assert!(completions[0].is_advisory());

    // Without a canonical nothing is in-IG.
    assert!(resolve_completions(&bindings, "src.", &DefinitionSet::default()).is_empty());
}

#[test]
fn test_alias_mismatch_leaves_name_unbound() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("mismatch.fml");
    write(
        &file,
        "uses \"http://hl7.org/fhir/StructureDefinition/Patient\" alias Pat as source\n\
         group G(source src : Patient)\n",
    );
    let mut indexer = SourceIndexer::new();
    indexer.scan_all(&[project.path()]);
    let bindings = indexer.bindings(&file).unwrap();
    assert_eq!(bindings[0].bound_name, None);
    assert!(resolve_completions(&bindings, "src.", &definitions()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_does_not_abort_scan() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join("maps/good.fml");
    write(&file, PATIENT_MAP);
    std::os::unix::fs::symlink(
        project.path().join("gone.fml"),
        project.path().join("stale-link"),
    )
    .unwrap();

    let mut indexer = SourceIndexer::new();
    assert_eq!(indexer.scan_all(&[project.path()]), 1);
    assert!(indexer.bindings(&file).is_some());

    let mut incremental = SourceIndexer::new();
    assert_eq!(incremental.file_changed(project.path()).unwrap(), 1);
    assert!(incremental.bindings(&file).is_some());
}
