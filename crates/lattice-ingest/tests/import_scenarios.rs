//! End-to-end import scenarios against an in-memory graph store.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use lattice_core::ids::LatticeId;
use lattice_core::keys::{AssertionKey, BASE_SCENARIO};
use lattice_core::models::{ImportStatus, ObjectRef};
use lattice_core::traits::GraphGateway;
use lattice_core::LatticeError;
use lattice_ingest::{ImportOptions, IngestEngine};
use lattice_spec::{SpecCache, WorkspaceRegistry};
use lattice_storage::GraphStore;

const WS: &str = "ws1";

const SCHEMA: &str = r#"
workspace_id: ws1
entity_types:
  Location:
    properties:
      region: { value_type: string }
  Device: {}
relationship_types:
  INSTALLED_AT: { from: Device, to: Location }
"#;

fn locations_spec(mode: &str, source_name: &str) -> String {
    format!(
        r#"
spec_name: locations
workspace_id: ws1
sheets:
  - sheet_name: Locations
    entities:
      loc:
        entity_type: Location
        key_columns: [loc_id]
        properties:
          - column: region
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: ""
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: {mode}
  normalization_rules:
    trim: true
    collapse_whitespace: true
    case_fold: true
    null_tokens: ["", "n/a"]
source_authority:
  source_name: {source_name}
  authority_rank: 1
  authority_domains: [Location]
"#
    )
}

const INSTALLS_SPEC: &str = r#"
spec_name: installs
workspace_id: ws1
sheets:
  - sheet_name: Installs
    entities:
      dev:
        entity_type: Device
        key_columns: [device_id]
      loc:
        entity_type: Location
        key_columns: [loc_id]
    relationships:
      - relationship_type: INSTALLED_AT
        from_entity: dev
        to_entity: loc
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: ""
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: strict
source_authority:
  source_name: installs-sheet
  authority_rank: 2
"#;

struct Env {
    dir: TempDir,
    store: Arc<GraphStore>,
    engine: IngestEngine<GraphStore>,
}

fn setup(specs: &[(&str, String)]) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let specs_dir = dir.path().join("specs");
    std::fs::create_dir(&specs_dir).unwrap();
    for (name, yaml) in specs {
        std::fs::write(specs_dir.join(format!("{name}.yaml")), yaml).unwrap();
    }

    let registry = Arc::new(WorkspaceRegistry::new());
    registry.register(SCHEMA).unwrap();

    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    let engine = IngestEngine::new(
        store.clone(),
        registry,
        Arc::new(SpecCache::new(&specs_dir)),
    );
    Env { dir, store, engine }
}

fn write_locations(env: &Env, filename: &str, rows: &[(&str, &str)]) -> PathBuf {
    let mut csv = String::from("loc_id,region\n");
    for (id, region) in rows {
        csv.push_str(&format!("{id},{region}\n"));
    }
    // The sheet name comes from the file stem.
    let path = env.dir.path().join(format!("{filename}.csv"));
    std::fs::write(&path, csv).unwrap();
    path
}

fn region_key(pk: &str) -> AssertionKey {
    AssertionKey::property(WS, "Location", pk, "region")
}

async fn open_count(store: &GraphStore, key: &AssertionKey) -> usize {
    store
        .open_assertions_for_key(WS, key, BASE_SCENARIO)
        .await
        .unwrap()
        .len()
}

// Scenario: first import of three fresh rows.
#[tokio::test]
async fn first_import_creates_entities_values_and_assertions() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let file = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west"), ("1003", "east")]);

    let outcome = env
        .engine
        .run_import(WS, "locations", &file, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, ImportStatus::Ok);
    assert_eq!(outcome.stats.created, 3);
    assert_eq!(outcome.stats.closed, 0);
    assert_eq!(outcome.stats.unchanged, 0);

    // 3 entities, one open HAS_PROPERTY assertion each.
    let mut value_ids: BTreeSet<LatticeId> = BTreeSet::new();
    for pk in ["1001", "1002", "1003"] {
        let entity = env
            .store
            .find_entity(WS, "Location", pk)
            .await
            .unwrap()
            .expect("entity created on first sighting");
        assert!(entity.convenience_props.contains_key("region"));

        let open = env
            .store
            .open_assertions_for_key(WS, &region_key(pk), BASE_SCENARIO)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].is_open());

        if let Some(ObjectRef::PropertyValue(id)) =
            env.store.assertion_object(WS, open[0].id).await.unwrap()
        {
            value_ids.insert(id);
        }
    }
    // One PropertyValue vertex per assertion, shared text or not.
    assert_eq!(value_ids.len(), 3);

    // Run row closed ok; exactly one ChangeEvent with 3 CREATED edges.
    let run = env
        .store
        .get_import_run(WS, outcome.import_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, ImportStatus::Ok);
    assert!(run.finished_at.is_some());

    let event = env
        .store
        .change_event_for_import(WS, outcome.import_run_id)
        .await
        .unwrap()
        .expect("one event per import");
    let (created, closed) = env.store.event_assertion_ids(WS, event.id).await.unwrap();
    assert_eq!(created.len(), 3);
    assert!(closed.is_empty());
}

// Law: import idempotence. The re-run emits an audit event with zero
// effect.
#[tokio::test]
async fn reimporting_an_unchanged_file_is_idempotent() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let file = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west"), ("1003", "east")]);

    let first = env
        .engine
        .run_import(WS, "locations", &file, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(first.stats.created, 3);

    let second = env
        .engine
        .run_import(WS, "locations", &file, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.closed, 0);
    assert_eq!(second.stats.unchanged, 3);

    // Still exactly one open assertion per key.
    assert_eq!(open_count(&env.store, &region_key("1001")).await, 1);

    // The zero-effect run still has its ChangeEvent, with no edges.
    let event = env
        .store
        .change_event_for_import(WS, second.import_run_id)
        .await
        .unwrap()
        .expect("audit trail records the run");
    let (created, closed) = env.store.event_assertion_ids(WS, event.id).await.unwrap();
    assert!(created.is_empty());
    assert!(closed.is_empty());
}

// Law: whitespace/case churn is invisible under normalized mode...
#[tokio::test]
async fn case_change_is_no_change_under_normalized_mode() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let v1 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west"), ("1003", "east")]);
    env.engine
        .run_import(WS, "locations", &v1, ImportOptions::default())
        .await
        .unwrap();

    let v2 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "WEST"), ("1003", "east")]);
    let outcome = env
        .engine
        .run_import(WS, "locations", &v2, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.stats.created, 0);
    assert_eq!(outcome.stats.closed, 0);
    assert_eq!(outcome.stats.unchanged, 3);
}

// ...and strict mode closes the old claim and opens a successor.
#[tokio::test]
async fn case_change_supersedes_under_strict_mode() {
    let env = setup(&[("locations", locations_spec("strict", "master-locations"))]);
    let v1 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west"), ("1003", "east")]);
    env.engine
        .run_import(WS, "locations", &v1, ImportOptions::default())
        .await
        .unwrap();
    let before = env
        .store
        .open_assertions_for_key(WS, &region_key("1002"), BASE_SCENARIO)
        .await
        .unwrap();
    let old_id = before[0].id;

    let v2 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "WEST"), ("1003", "east")]);
    let outcome = env
        .engine
        .run_import(WS, "locations", &v2, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(outcome.stats.closed, 1);
    assert_eq!(outcome.stats.unchanged, 2);

    let open = env
        .store
        .open_assertions_for_key(WS, &region_key("1002"), BASE_SCENARIO)
        .await
        .unwrap();
    assert_eq!(open.len(), 1, "old claim closed, successor open");
    assert_ne!(open[0].id, old_id);
    assert_eq!(open[0].supersedes, Some(old_id));

    let closed = env
        .store
        .assertions_by_ids(WS, &[old_id])
        .await
        .unwrap()
        .remove(0);
    assert!(!closed.is_open());
}

// Scenario: row disappearance closes the claim but never the entity.
#[tokio::test]
async fn row_disappearance_closes_assertion_entity_remains() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let v1 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west"), ("1003", "east")]);
    env.engine
        .run_import(WS, "locations", &v1, ImportOptions::default())
        .await
        .unwrap();

    let v2 = write_locations(&env, "Locations", &[("1001", "east"), ("1002", "west")]);
    let outcome = env
        .engine
        .run_import(WS, "locations", &v2, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.stats.created, 0);
    assert_eq!(outcome.stats.closed, 1);
    assert_eq!(outcome.stats.unchanged, 2);

    assert_eq!(open_count(&env.store, &region_key("1003")).await, 0);

    // Entities are never deleted; the derived property map empties out.
    let entity = env
        .store
        .find_entity(WS, "Location", "1003")
        .await
        .unwrap()
        .expect("entity survives disappearance");
    assert!(entity.convenience_props.is_empty());
}

#[tokio::test]
async fn relationship_rows_assert_between_entities() {
    let env = setup(&[("installs", INSTALLS_SPEC.to_string())]);
    let path = env.dir.path().join("Installs.csv");
    std::fs::write(&path, "device_id,loc_id\nd1,1001\n").unwrap();

    let outcome = env
        .engine
        .run_import(WS, "installs", &path, ImportOptions::default())
        .await
        .unwrap();
    // One relationship assertion; no properties declared.
    assert_eq!(outcome.stats.created, 1);

    let key = AssertionKey::relationship(WS, "Device", "d1", "INSTALLED_AT", "Location", "1001");
    let open = env
        .store
        .open_assertions_for_key(WS, &key, BASE_SCENARIO)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);

    let device = env.store.find_entity(WS, "Device", "d1").await.unwrap().unwrap();
    let location = env.store.find_entity(WS, "Location", "1001").await.unwrap().unwrap();
    assert_eq!(
        env.store.assertion_subject(WS, open[0].id).await.unwrap(),
        Some(device.id)
    );
    assert_eq!(
        env.store.assertion_object(WS, open[0].id).await.unwrap(),
        Some(ObjectRef::Entity(location.id))
    );
}

#[tokio::test]
async fn missing_sheet_marks_the_run_failed() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    // Wrong file stem: the declared sheet "Locations" is absent.
    let file = write_locations(&env, "Wrong", &[("1001", "east")]);

    let err = env
        .engine
        .run_import(WS, "locations", &file, ImportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LatticeError::Ingest(_)), "got {err:?}");

    let runs = env.store.list_import_runs(WS, 10, 0).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ImportStatus::Failed);
    assert!(runs[0].error.as_deref().unwrap_or("").contains("Locations"));
}

#[tokio::test]
async fn expired_deadline_fails_the_run_before_materializing() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let file = write_locations(&env, "Locations", &[("1001", "east")]);

    let mut options = ImportOptions::default();
    options.deadline = Some(Utc::now() - Duration::seconds(1));
    let err = env
        .engine
        .run_import(WS, "locations", &file, options)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("deadline"), "got {err}");

    // Nothing became visible.
    assert_eq!(open_count(&env.store, &region_key("1001")).await, 0);
    let runs = env.store.list_import_runs(WS, 10, 0).await.unwrap();
    assert_eq!(runs[0].status, ImportStatus::Failed);
}

#[tokio::test]
async fn unknown_spec_and_workspace_are_validation_errors() {
    let env = setup(&[("locations", locations_spec("normalized", "master-locations"))]);
    let file = write_locations(&env, "Locations", &[("1001", "east")]);

    let err = env
        .engine
        .run_import(WS, "absent-spec", &file, ImportOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let err = env
        .engine
        .run_import("ws-other", "locations", &file, ImportOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("workspace"));
}
