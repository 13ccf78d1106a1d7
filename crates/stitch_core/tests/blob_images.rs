use serde_json::{json, Value};
use stitch_core::db::open_db_in_memory;
use stitch_core::{
    BaseCatalogLoader, EntityKind, Fields, ImageRef, KvStore, MemoryCatalogSource,
    NarrativeContext, Record, SqliteKvStore,
};

const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

fn catalog() -> BaseCatalogLoader {
    let source = MemoryCatalogSource::new()
        .with_document(
            "characters.json",
            json!({"characters": [
                {"id": "c1", "projectId": "p1", "image": "portraits/mira.png"},
                {"id": "c2", "projectId": "p1", "image": ""}
            ]})
            .to_string(),
        )
        .with_document(
            "events.json",
            json!({"events": [{"id": "e1", "projectId": "p1", "title": "Storm"}]}).to_string(),
        );
    BaseCatalogLoader::new(source)
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

#[test]
fn local_image_resolves_through_side_table() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let characters = ctx.characters();

    let created = characters
        .create(fields(json!({"projectId": "p1", "name": "Tamsin"})))
        .unwrap()
        .value;
    let id = created.id().unwrap().to_string();
    characters.blobs().unwrap().save(&id, PNG).unwrap();
    let image_field = ImageRef::local(id.as_str()).to_field_text().unwrap();
    let updated = characters
        .update(&id, fields(json!({ "image": image_field })))
        .unwrap()
        .value
        .unwrap();

    assert_eq!(updated.image_ref(), ImageRef::Local(id.clone()));
    assert_eq!(
        ctx.image_url(EntityKind::Character, &updated).unwrap().as_deref(),
        Some(PNG)
    );
}

#[test]
fn external_and_empty_images_bypass_side_table() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);

    let external = ctx.characters().get_by_id("c1").unwrap().unwrap();
    let empty = ctx.characters().get_by_id("c2").unwrap().unwrap();

    assert_eq!(
        ctx.image_url(EntityKind::Character, &external).unwrap().as_deref(),
        Some("portraits/mira.png")
    );
    assert_eq!(ctx.image_url(EntityKind::Character, &empty).unwrap(), None);
    assert_eq!(kv.get("characters_images").unwrap(), None);
}

#[test]
fn local_reference_without_payload_resolves_to_none() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let record = Record::from_value(json!({"id": "c9", "image": "local:c9"})).unwrap();

    assert_eq!(ctx.image_url(EntityKind::Character, &record).unwrap(), None);
}

#[test]
fn deleting_event_removes_its_blob() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let events = ctx.events();
    let blobs = events.blobs().unwrap();

    blobs.save("e1", PNG).unwrap();
    events.delete("e1").unwrap();

    assert_eq!(blobs.get("e1").unwrap(), None);
    assert!(events.get_merged(Some("p1")).unwrap().is_empty());
}

#[test]
fn clear_all_empties_the_side_table() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let blobs = ctx.characters().blobs().unwrap();

    blobs.save("c1", PNG).unwrap();
    blobs.save("c2", PNG).unwrap();
    assert!(ctx.clear_all().is_durable());

    assert_eq!(blobs.get("c1").unwrap(), None);
    assert_eq!(kv.get("characters_images").unwrap(), None);
}

#[test]
fn kinds_without_side_table_only_pass_external_images() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let record = Record::from_value(json!({"id": "t1", "image": "local:t1"})).unwrap();

    let external = Record::from_value(json!({"id": "t2", "image": "maps/harbor.png"})).unwrap();

    assert!(ctx.timeline().blobs().is_none());
    assert_eq!(ctx.image_url(EntityKind::Timeline, &record).unwrap(), None);
    assert_eq!(
        ctx.image_url(EntityKind::Timeline, &external).unwrap().as_deref(),
        Some("maps/harbor.png")
    );
}

#[test]
fn oversized_payload_is_reported_as_not_durable() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn).with_quota(16);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let blobs = ctx.characters().blobs().unwrap();

    let ack = blobs.save("c1", PNG).unwrap();

    assert!(!ack.is_durable());
    assert_eq!(ack.error().unwrap().key, "characters_images");
    assert_eq!(blobs.get("c1").unwrap(), None);
}

#[test]
fn bare_marker_resolves_the_empty_id() {
    let conn = open_db_in_memory().unwrap();
    let kv = SqliteKvStore::new(&conn);
    let loader = catalog();
    let ctx = NarrativeContext::new(&kv, &loader, None);
    let record = Record::from_value(json!({"id": "c9", "image": "local:"})).unwrap();

    ctx.characters().blobs().unwrap().save("", PNG).unwrap();

    assert_eq!(record.image_ref(), ImageRef::Local(String::new()));
    assert_eq!(
        ctx.image_url(EntityKind::Character, &record).unwrap().as_deref(),
        Some(PNG)
    );
}
