//! Read-side projections over the store — spec component I. Row-shaping
//! (building the per-hop detail object, collapsing hops into directed
//! edges) happens in application code rather than leaning on SQLite's
//! `json_group_object`/`json_group_array` the way the original did, since
//! that keeps the shaping logic testable without depending on the bundled
//! SQLite build carrying the JSON1 extension.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use disttrace_store::{Store, StoreError};

/// One row of the trace-history projection.
#[derive(Debug, Clone, Serialize)]
pub struct TraceHistoryEntry {
    #[serde(rename = "TraceID")]
    pub trace_id: Uuid,
    #[serde(rename = "SlaveName")]
    pub agent_name: String,
    #[serde(rename = "DestName")]
    pub target_name: String,
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "HopCnt")]
    pub hop_count: i64,
    #[serde(rename = "DetailJSON")]
    pub hop_detail: Value,
}

/// Joins traceroutes ⨝ agents ⨝ targets with a left-join on hops, grouped by
/// traceroute id, ordered by start time descending, with an optional limit
/// on the number of *traceroutes* returned (not raw joined rows).
pub fn trace_history(store: &Store, limit: Option<i64>) -> Result<Vec<TraceHistoryEntry>, StoreError> {
    #[allow(clippy::type_complexity)]
    let rows: Vec<(String, String, String, String, Option<i64>, Option<String>, Option<String>, Option<f64>)> = store.query_rows(
        "SELECT t.id, a.name, tg.name, t.start_time, h.hop_index, h.ip_address, h.dns_name, h.duration_secs
         FROM traceroutes t
         JOIN agents a ON a.id = t.agent_id
         JOIN targets tg ON tg.id = t.target_id
         LEFT JOIN hops h ON h.traceroute_id = t.id
         ORDER BY t.start_time DESC, t.id",
        [],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<f64>>(7)?,
            ))
        },
    )?;

    let mut ordered_ids: Vec<String> = Vec::new();
    let mut entries: BTreeMap<String, TraceHistoryEntry> = BTreeMap::new();
    let mut hop_counts: BTreeMap<String, i64> = BTreeMap::new();
    let mut hop_details: BTreeMap<String, serde_json::Map<String, Value>> = BTreeMap::new();

    for (trace_id, agent_name, target_name, start_time, hop_index, ip, dns, duration) in rows {
        if !entries.contains_key(&trace_id) {
            ordered_ids.push(trace_id.clone());
            entries.insert(
                trace_id.clone(),
                TraceHistoryEntry {
                    trace_id: trace_id.parse().unwrap_or_default(),
                    agent_name,
                    target_name,
                    start_time,
                    hop_count: 0,
                    hop_detail: Value::Null,
                },
            );
            hop_counts.insert(trace_id.clone(), 0);
            hop_details.insert(trace_id.clone(), serde_json::Map::new());
        }

        if let (Some(index), Some(ip)) = (hop_index, ip) {
            *hop_counts.get_mut(&trace_id).unwrap() += 1;
            hop_details.get_mut(&trace_id).unwrap().insert(
                index.to_string(),
                json!({ "IP": ip, "DNS": dns, "Duration": duration.unwrap_or(0.0) }),
            );
        }
    }

    let mut out = Vec::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        let mut entry = entries.remove(&id).unwrap();
        entry.hop_count = hop_counts.remove(&id).unwrap_or(0);
        entry.hop_detail = Value::Object(hop_details.remove(&id).unwrap_or_default());
        out.push(entry);
    }

    if let Some(limit) = limit {
        out.truncate(limit.max(0) as usize);
    }

    Ok(out)
}

/// One directed edge in the per-link hop graph: `previousHopAddress →
/// hopAddress` at a given hop index, aggregated over every matching
/// traceroute.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub previous_address: String,
    pub address: String,
    pub hop_index: i64,
    pub count: i64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone)]
pub struct GraphResult {
    pub start: Option<String>,
    pub end: Option<String>,
    pub edges: Vec<GraphEdge>,
}

impl GraphResult {
    /// Builds the `{Start, End, Data}` response shape spec §4.I describes,
    /// including the `Data: {}` empty sentinel when there are no edges.
    pub fn to_json(&self) -> Value {
        let data = if self.edges.is_empty() {
            json!({})
        } else {
            Value::Array(
                self.edges
                    .iter()
                    .map(|e| {
                        json!([e.previous_address, e.address, e.count, e.avg_duration_ms])
                    })
                    .collect(),
            )
        };
        json!({
            "Start": self.start,
            "End": self.end,
            "Data": data,
        })
    }
}

/// Per-link hop graph for a `(destID, slaveID, skip)` tuple: edges among
/// hops with index > `skip` belonging to that target and agent. `NULL`
/// previous-hop address is coalesced to the literal `"0"`, matching the
/// original.
pub fn graph(store: &Store, dest_id: Uuid, slave_id: Uuid, skip: i64) -> Result<GraphResult, StoreError> {
    let bounds = store.query_row(
        "SELECT MIN(t.start_time), MAX(t.start_time)
         FROM hops h
         JOIN traceroutes t ON t.id = h.traceroute_id
         WHERE t.target_id = ?1 AND t.agent_id = ?2 AND h.hop_index > ?3",
        rusqlite::params![dest_id.to_string(), slave_id.to_string(), skip],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        },
    )?;
    let (start, end) = bounds.unwrap_or((None, None));

    let edges = store.query_rows(
        "SELECT h.ip_address, h.hop_index, COALESCE(prev.ip_address, '0'), COUNT(*), AVG(h.duration_secs) * 1000.0
         FROM hops h
         JOIN traceroutes t ON t.id = h.traceroute_id
         LEFT JOIN hops prev ON h.previous_hop_id = prev.id
         WHERE t.target_id = ?1 AND t.agent_id = ?2 AND h.hop_index > ?3
         GROUP BY h.ip_address, h.hop_index, COALESCE(prev.ip_address, '0')
         ORDER BY h.hop_index",
        rusqlite::params![dest_id.to_string(), slave_id.to_string(), skip],
        |row| {
            Ok(GraphEdge {
                address: row.get(0)?,
                hop_index: row.get(1)?,
                previous_address: row.get(2)?,
                count: row.get(3)?,
                avg_duration_ms: row.get(4)?,
            })
        },
    )?;

    Ok(GraphResult { start, end, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use disttrace_store::Store;

    fn seed(store: &Store) -> (Uuid, Uuid, Uuid) {
        let agent_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        let trace_id = Uuid::new_v4();

        store
            .execute(
                "INSERT INTO agents (id, name, secret) VALUES (?1, 'falbala', '1234')",
                rusqlite::params![agent_id.to_string()],
            )
            .unwrap();
        store
            .execute(
                "INSERT INTO targets (id, name, address, retries, max_hops, timeout_ms)
                 VALUES (?1, 'google', '8.8.8.8', 1, 30, 500)",
                rusqlite::params![target_id.to_string()],
            )
            .unwrap();
        store
            .execute(
                "INSERT INTO traceroutes (id, agent_id, target_id, start_time, annotations)
                 VALUES (?1, ?2, ?3, '2026-01-01T00:00:00Z', '')",
                rusqlite::params![trace_id.to_string(), agent_id.to_string(), target_id.to_string()],
            )
            .unwrap();

        let hop0 = Uuid::new_v4();
        let hop1 = Uuid::new_v4();
        store
            .execute(
                "INSERT INTO hops (id, traceroute_id, hop_index, ip_address, dns_name, duration_secs, previous_hop_id)
                 VALUES (?1, ?2, 0, '10.0.0.1', NULL, 0.01, NULL)",
                rusqlite::params![hop0.to_string(), trace_id.to_string()],
            )
            .unwrap();
        store
            .execute(
                "INSERT INTO hops (id, traceroute_id, hop_index, ip_address, dns_name, duration_secs, previous_hop_id)
                 VALUES (?1, ?2, 1, '10.0.0.2', NULL, 0.02, ?3)",
                rusqlite::params![hop1.to_string(), trace_id.to_string(), hop0.to_string()],
            )
            .unwrap();

        (agent_id, target_id, trace_id)
    }

    #[test]
    fn trace_history_groups_hops_under_one_entry() {
        let store = Store::open_in_memory().unwrap();
        let (_agent, _target, trace_id) = seed(&store);

        let history = trace_history(&store, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trace_id, trace_id);
        assert_eq!(history[0].hop_count, 2);
        assert!(history[0].hop_detail.get("0").is_some());
        assert!(history[0].hop_detail.get("1").is_some());
    }

    #[test]
    fn graph_coalesces_null_previous_to_sentinel() {
        let store = Store::open_in_memory().unwrap();
        let (agent_id, target_id, _trace) = seed(&store);

        let result = graph(&store, target_id, agent_id, -1).unwrap();
        assert_eq!(result.edges.len(), 2);
        let root = result.edges.iter().find(|e| e.hop_index == 0).unwrap();
        assert_eq!(root.previous_address, "0");
    }

    #[test]
    fn graph_skip_excludes_early_hops() {
        let store = Store::open_in_memory().unwrap();
        let (agent_id, target_id, _trace) = seed(&store);

        let result = graph(&store, target_id, agent_id, 0).unwrap();
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].hop_index, 1);
    }

    #[test]
    fn graph_with_no_matching_rows_has_object_sentinel() {
        let store = Store::open_in_memory().unwrap();
        let result = graph(&store, Uuid::new_v4(), Uuid::new_v4(), 0).unwrap();
        assert_eq!(result.to_json()["Data"], json!({}));
    }
}
