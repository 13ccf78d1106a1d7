use serde_json::json;
use std::fs;
use std::path::Path;
use stitch_core::{BaseCatalogLoader, DirCatalogSource, EntityKind, LoadError, MemoryCatalogSource};

fn write_document(dir: &Path, name: &str, value: serde_json::Value) {
    fs::write(dir.join(name), value.to_string()).unwrap();
}

#[test]
fn directory_documents_are_fetched_once_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        dir.path(),
        "characters.json",
        json!({"characters": [
            {"id": "c1", "projectId": "p1"},
            {"id": "c2", "projectId": "p2"}
        ]}),
    );
    let loader = BaseCatalogLoader::new(DirCatalogSource::new(dir.path()));

    assert_eq!(loader.get_by_scope(EntityKind::Character, None).len(), 2);
    assert!(loader.is_cached("characters.json"));

    fs::remove_file(dir.path().join("characters.json")).unwrap();
    let scoped = loader.get_by_scope(EntityKind::Character, Some("p2"));
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id(), Some("c2"));

    loader.clear_cache();
    assert!(loader.get_by_scope(EntityKind::Character, None).is_empty());
    assert!(!loader.is_cached("characters.json"));
}

#[test]
fn failed_loads_are_retried_on_next_access() {
    let dir = tempfile::tempdir().unwrap();
    let loader = BaseCatalogLoader::new(DirCatalogSource::new(dir.path()));

    let err = loader.load(EntityKind::Event).unwrap_err();
    assert!(matches!(err, LoadError::Missing { .. }));
    assert_eq!(err.document(), "events.json");

    write_document(
        dir.path(),
        "events.json",
        json!({"events": [{"id": "e1", "projectId": "p1"}]}),
    );
    assert_eq!(loader.load(EntityKind::Event).unwrap().len(), 1);
}

#[test]
fn malformed_document_reports_parse_error_and_degrades_to_empty() {
    let source = MemoryCatalogSource::new().with_document("foreshadowing.json", "{\"foreshadowing\": [");
    let loader = BaseCatalogLoader::new(source);

    assert!(matches!(
        loader.load(EntityKind::Foreshadowing),
        Err(LoadError::Parse { .. })
    ));
    assert!(loader.get_by_scope(EntityKind::Foreshadowing, Some("p1")).is_empty());
    assert!(!loader.is_cached("foreshadowing.json"));
}

#[test]
fn document_without_collection_key_is_empty() {
    let source = MemoryCatalogSource::new().with_document("synopsis.json", json!({}).to_string());
    let loader = BaseCatalogLoader::new(source);

    assert!(loader.load(EntityKind::Synopsis).unwrap().is_empty());
}

#[test]
fn taxonomies_come_from_kind_documents() {
    let source = MemoryCatalogSource::new()
        .with_document(
            "relationships.json",
            json!({
                "relationships": [],
                "relationshipTypes": [{"id": "friend"}, {"id": "rival"}]
            })
            .to_string(),
        )
        .with_document(
            "foreshadowing.json",
            json!({
                "foreshadowing": [],
                "foreshadowingTypes": [{"id": "object"}],
                "statusTypes": [{"id": "미회수"}, {"id": "회수완료"}, {"id": "폐기"}]
            })
            .to_string(),
        );
    let loader = BaseCatalogLoader::new(source);

    assert_eq!(loader.relationship_types().len(), 2);
    assert_eq!(loader.foreshadowing_types(), vec![json!({"id": "object"})]);
    assert_eq!(loader.foreshadowing_status_types().len(), 3);
}

#[test]
fn missing_auxiliary_documents_yield_empty_lists() {
    let loader = BaseCatalogLoader::new(MemoryCatalogSource::new());

    assert!(loader.relationship_types().is_empty());
    assert!(loader.projects().is_empty());
    assert!(loader.active_project().is_none());
    assert!(loader.synopsis_templates(None).is_empty());
}

#[test]
fn active_project_prefers_flagged_entry() {
    let flagged = MemoryCatalogSource::new().with_document(
        "projects.json",
        json!({"projects": [
            {"id": "p1", "title": "Draft"},
            {"id": "p2", "title": "Saga", "active": true}
        ]})
        .to_string(),
    );
    let unflagged = MemoryCatalogSource::new().with_document(
        "projects.json",
        json!({"projects": [{"id": "p1"}, {"id": "p2"}]}).to_string(),
    );

    let flagged = BaseCatalogLoader::new(flagged);
    assert_eq!(flagged.projects().len(), 2);
    assert_eq!(flagged.active_project().unwrap().id(), Some("p2"));
    assert_eq!(
        BaseCatalogLoader::new(unflagged).active_project().unwrap().id(),
        Some("p1")
    );
}

#[test]
fn synopsis_templates_and_presets_filter_by_scope() {
    let source = MemoryCatalogSource::new().with_document(
        "synopsis_templates.json",
        json!({
            "templates": [
                {"id": "tpl1", "projectId": "p1"},
                {"id": "tpl2", "projectId": "p2"}
            ],
            "presetSynopses": [
                {"id": "pre1", "projectId": "p1"},
                {"id": "pre2", "projectId": "p1"}
            ]
        })
        .to_string(),
    );
    let loader = BaseCatalogLoader::new(source);

    let templates = loader.synopsis_templates(Some("p2"));
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].id(), Some("tpl2"));
    assert_eq!(loader.preset_synopses(Some("p1")).len(), 2);
    assert!(loader.preset_synopses(Some("p2")).is_empty());
    assert_eq!(loader.synopsis_templates(None).len(), 2);
}
