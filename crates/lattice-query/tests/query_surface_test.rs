//! Read-surface tests: search, resolved/all-claims detail, import diffs.
//! Exercises the full pipeline: import through lattice-ingest, read back
//! through QueryService.

use std::sync::Arc;

use lattice_core::models::{Actor, ValueType};
use lattice_core::traits::GraphGateway;
use lattice_core::LatticeError;
use lattice_ingest::{ImportOptions, IngestEngine, ManualAssertionRequest, ManualTarget};
use lattice_query::{QueryService, SearchParams, ViewMode};
use lattice_spec::{SpecCache, WorkspaceRegistry};
use lattice_storage::GraphStore;
use tempfile::TempDir;

const WS: &str = "ws1";

const SCHEMA: &str = r#"
workspace_id: ws1
entity_types:
  Connection:
    properties:
      speed: { value_type: number }
  Device: {}
relationship_types:
  CARRIES: { from: Connection, to: Device }
"#;

fn connections_spec(spec_name: &str, source_name: &str, rank: i64) -> String {
    format!(
        r#"
spec_name: {spec_name}
workspace_id: ws1
sheets:
  - sheet_name: {spec_name}
    entities:
      conn:
        entity_type: Connection
        key_columns: [conn_id]
        properties:
          - column: speed
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: ""
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: normalized
  normalization_rules:
    trim: true
    case_fold: true
source_authority:
  source_name: {source_name}
  authority_rank: {rank}
  authority_domains: [Connection]
"#
    )
}

struct Env {
    dir: TempDir,
    store: Arc<GraphStore>,
    engine: IngestEngine<GraphStore>,
    query: QueryService<GraphStore>,
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
        registry.clone(),
        Arc::new(SpecCache::new(&specs_dir)),
    );
    let query = QueryService::new(store.clone(), registry);
    Env {
        dir,
        store,
        engine,
        query,
    }
}

async fn import_speed(env: &Env, spec_name: &str, speed: &str) {
    let path = env.dir.path().join(format!("{spec_name}.csv"));
    std::fs::write(&path, format!("conn_id,speed\nc1,{speed}\n")).unwrap();
    env.engine
        .run_import(WS, spec_name, &path, ImportOptions::default())
        .await
        .unwrap();
}

// Scenario: two sources claim the same fact; authority resolves reads
// while both claims stay open.
#[tokio::test]
async fn multi_source_conflict_resolves_by_authority() {
    let env = setup(&[
        ("conn_a", connections_spec("conn_a", "source-a", 1)),
        ("conn_b", connections_spec("conn_b", "source-b", 2)),
    ]);
    import_speed(&env, "conn_a", "100").await;
    import_speed(&env, "conn_b", "200").await;

    let entity = env
        .store
        .find_entity(WS, "Connection", "c1")
        .await
        .unwrap()
        .unwrap();

    // Resolved view: the stronger authority wins.
    let detail = env
        .query
        .entity_detail(WS, entity.id, ViewMode::Resolved, None, None)
        .await
        .unwrap();
    assert_eq!(detail.properties.len(), 1);
    let prop = &detail.properties[0];
    assert_eq!(prop.property_key, "speed");
    assert_eq!(prop.claims.len(), 1);
    assert_eq!(prop.claims[0].value, "100");
    assert_eq!(prop.claims[0].assertion.is_winner, Some(true));

    // All-claims view: both open claims, annotated.
    let detail = env
        .query
        .entity_detail(WS, entity.id, ViewMode::AllClaims, None, None)
        .await
        .unwrap();
    let prop = &detail.properties[0];
    assert_eq!(prop.claims.len(), 2);
    let winner = prop.claims.iter().find(|c| c.assertion.is_winner == Some(true)).unwrap();
    let loser = prop.claims.iter().find(|c| c.assertion.is_winner == Some(false)).unwrap();
    assert_eq!(winner.value, "100");
    assert_eq!(loser.value, "200");
    assert!(loser.assertion.reason.is_some());
}

// Scenario: a manual claim beats every authority rank.
#[tokio::test]
async fn manual_override_wins_regardless_of_rank() {
    let env = setup(&[
        ("conn_a", connections_spec("conn_a", "source-a", 1)),
        ("conn_b", connections_spec("conn_b", "source-b", 2)),
    ]);
    import_speed(&env, "conn_a", "100").await;
    import_speed(&env, "conn_b", "200").await;

    let entity = env
        .store
        .find_entity(WS, "Connection", "c1")
        .await
        .unwrap()
        .unwrap();

    env.engine
        .record_manual_assertion(ManualAssertionRequest {
            workspace_id: WS.to_string(),
            entity_type: "Connection".to_string(),
            primary_key: "c1".to_string(),
            target: ManualTarget::Property {
                property_key: "speed".to_string(),
                value: "300".to_string(),
                value_type: ValueType::Number,
            },
            scenario_id: "base".to_string(),
            confidence: 1.0,
            valid_from: None,
            source_name: "ops-override".to_string(),
            actor: Actor::User("ops".to_string()),
            note: Some("measured on site".to_string()),
        })
        .await
        .unwrap();

    let detail = env
        .query
        .entity_detail(WS, entity.id, ViewMode::Resolved, None, None)
        .await
        .unwrap();
    assert_eq!(detail.properties[0].claims[0].value, "300");

    let detail = env
        .query
        .entity_detail(WS, entity.id, ViewMode::AllClaims, None, None)
        .await
        .unwrap();
    assert_eq!(detail.properties[0].claims.len(), 3);
    assert_eq!(
        detail.properties[0]
            .claims
            .iter()
            .filter(|c| c.assertion.is_winner == Some(true))
            .count(),
        1
    );

    // The derived convenience copy follows the resolved view.
    let entity = env
        .store
        .find_entity(WS, "Connection", "c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.convenience_props.get("speed").map(String::as_str), Some("300"));
}

#[tokio::test]
async fn search_pages_and_filters_by_type_and_substring() {
    let env = setup(&[("conn_a", connections_spec("conn_a", "source-a", 1))]);
    let path = env.dir.path().join("conn_a.csv");
    let mut csv = String::from("conn_id,speed\n");
    for i in 0..60 {
        csv.push_str(&format!("c{i:03},10\n"));
    }
    std::fs::write(&path, csv).unwrap();
    env.engine
        .run_import(WS, "conn_a", &path, ImportOptions::default())
        .await
        .unwrap();

    // Default page size caps at 50.
    let page = env
        .query
        .search_entities(WS, &SearchParams::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 50);
    assert_eq!(page.limit, 50);

    let page = env
        .query
        .search_entities(
            WS,
            &SearchParams {
                limit: Some(10),
                offset: Some(55),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 5);

    let page = env
        .query
        .search_entities(
            WS,
            &SearchParams {
                entity_type: Some("Connection".to_string()),
                q: Some("c007".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].entity.primary_key, "c007");

    // Unknown workspace is a 404-category error.
    let err = env
        .query
        .search_entities("nope", &SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LatticeError::NotFound { .. }));
}

#[tokio::test]
async fn entity_detail_404s_on_missing_or_cross_workspace_entity() {
    let env = setup(&[("conn_a", connections_spec("conn_a", "source-a", 1))]);
    import_speed(&env, "conn_a", "100").await;

    let missing = lattice_core::ids::LatticeId::mint(lattice_core::ids::IdKind::Entity);
    let err = env
        .query
        .entity_detail(WS, missing, ViewMode::Resolved, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LatticeError::NotFound { .. }));
}

#[tokio::test]
async fn import_diff_dereferences_created_and_closed() {
    let env = setup(&[("conn_a", connections_spec("conn_a", "source-a", 1))]);
    import_speed(&env, "conn_a", "100").await;
    // Second import changes the value: closes one, creates one.
    let path = env.dir.path().join("conn_a.csv");
    std::fs::write(&path, "conn_id,speed\nc1,150\n").unwrap();
    let outcome = env
        .engine
        .run_import(WS, "conn_a", &path, ImportOptions::default())
        .await
        .unwrap();

    let diff = env
        .query
        .import_diff(WS, outcome.import_run_id)
        .await
        .unwrap();
    assert_eq!(diff.created.len(), 1);
    assert_eq!(diff.closed.len(), 1);

    let created = &diff.created[0];
    assert!(created.summary.contains("speed"));
    assert!(created.summary.contains("150"));
    assert_eq!(
        created.subject.as_ref().map(|s| s.primary_key.as_str()),
        Some("c1")
    );

    let runs = env.query.list_import_runs(WS, None, None).await.unwrap();
    assert_eq!(runs.items.len(), 2);
    // Newest first.
    assert_eq!(runs.items[0].id, outcome.import_run_id);
}

// The response structs are the JSON contract; pin the shape.
#[tokio::test]
async fn entity_detail_serializes_to_the_documented_shape() {
    let env = setup(&[("conn_a", connections_spec("conn_a", "source-a", 1))]);
    import_speed(&env, "conn_a", "100").await;

    let entity = env
        .store
        .find_entity(WS, "Connection", "c1")
        .await
        .unwrap()
        .unwrap();
    let detail = env
        .query
        .entity_detail(WS, entity.id, ViewMode::Resolved, None, None)
        .await
        .unwrap();

    let json = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["entity_type"], "Connection");
    assert_eq!(json["primary_key"], "c1");
    assert_eq!(json["scenario_id"], "base");
    assert_eq!(json["view_mode"], "resolved");

    let claim = &json["properties"][0]["claims"][0];
    assert_eq!(claim["value"], "100");
    assert_eq!(claim["value_type"], "number");
    assert_eq!(claim["assertion"]["is_winner"], true);
    assert_eq!(claim["assertion"]["source_type"], "spreadsheet");
    // Losers carry a reason; winners omit the field entirely.
    assert!(claim["assertion"].get("reason").is_none());
    // Ids render with their kind prefixes.
    assert!(claim["assertion"]["id"].as_str().unwrap().starts_with("asrt_"));
}
