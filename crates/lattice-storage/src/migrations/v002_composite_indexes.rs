//! v002: the composite indexes the query surface and the orchestrator rely
//! on.

use rusqlite::Connection;

use lattice_core::errors::LatticeResult;

use crate::store_err;

pub fn migrate(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_entities_ws_display
            ON entities(workspace_id, display_name);

        CREATE INDEX IF NOT EXISTS idx_assertions_ws_key_scenario
            ON assertions(workspace_id, assertion_key, scenario_id);
        CREATE INDEX IF NOT EXISTS idx_assertions_ws_valid
            ON assertions(workspace_id, valid_from, valid_to);
        CREATE INDEX IF NOT EXISTS idx_assertions_ws_source_recorded
            ON assertions(workspace_id, source_id, recorded_at);
        CREATE INDEX IF NOT EXISTS idx_assertions_ws_import
            ON assertions(workspace_id, import_run_id);

        CREATE INDEX IF NOT EXISTS idx_values_ws_key
            ON property_values(workspace_id, property_key, value, value_type);

        CREATE INDEX IF NOT EXISTS idx_edges_from
            ON edges(edge_type, from_id);
        CREATE INDEX IF NOT EXISTS idx_edges_to
            ON edges(edge_type, to_id);

        CREATE INDEX IF NOT EXISTS idx_import_runs_ws_spec
            ON import_runs(workspace_id, spec_name, started_at);
        ",
    )
    .map_err(store_err)?;
    Ok(())
}
