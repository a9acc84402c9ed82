// In-memory stand-in for the managed backend, used by tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{DbResult, Filter, Query, RemoteStore};
use crate::error::BaseError;

type RpcHandler = Box<dyn Fn(&Value) -> DbResult<Value> + Send + Sync>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    procedures: Mutex<HashMap<String, RpcHandler>>,
    rpc_calls: Mutex<Vec<(String, Value)>>,
    selects: Mutex<Vec<String>>,
    failing_inserts: Mutex<HashSet<String>>,
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = |col: &str| row.get(col).map(as_text).unwrap_or_else(|| "null".to_string());
    match filter {
        Filter::Eq(col, v) => field(col) == *v,
        Filter::Neq(col, v) => field(col) != *v,
        Filter::ILike(col, pattern) => {
            let needle = pattern.trim_matches('%').to_lowercase();
            field(col).to_lowercase().contains(&needle)
        }
        Filter::In(col, values) => values.contains(&field(col)),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => as_text(x).cmp(&as_text(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    pub fn on_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value) -> DbResult<Value> + Send + Sync + 'static,
    {
        self.procedures
            .lock()
            .unwrap()
            .insert(name.to_string(), Box::new(handler));
    }

    pub fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.rpc_calls.lock().unwrap().clone()
    }

    /// Every later insert into `table` fails with a backend error.
    pub fn fail_inserts_into(&self, table: &str) {
        self.failing_inserts.lock().unwrap().insert(table.to_string());
    }

    /// Tables read so far, in call order.
    pub fn selects(&self) -> Vec<String> {
        self.selects.lock().unwrap().clone()
    }

    fn filtered(rows: &[Value], query: &Query) -> Vec<Value> {
        rows.iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, query: &Query) -> DbResult<Vec<Value>> {
        self.selects.lock().unwrap().push(query.table.clone());
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&query.table).cloned().unwrap_or_default();
        let mut result = Self::filtered(&rows, query);
        for order in query.order.iter().rev() {
            result.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(result.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&self, table: &str, rows: Value) -> DbResult<Vec<Value>> {
        let rows = match rows {
            Value::Array(rows) => rows,
            other => vec![other],
        };
        if self.failing_inserts.lock().unwrap().contains(table) {
            return Err(BaseError::Backend(Some(format!("insert into {} rejected", table))));
        }
        let mut inserted = Vec::with_capacity(rows.len());
        let mut tables = self.tables.lock().unwrap();
        let target = tables.entry(table.to_string()).or_default();
        for mut row in rows {
            if row.get("id").map_or(true, Value::is_null) {
                row["id"] = json!(uuid::Uuid::new_v4().to_string());
            }
            target.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, query: &Query, patch: Value) -> DbResult<Vec<Value>> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(query.table.clone()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if query.filters.iter().all(|f| matches(row, f)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> DbResult<Vec<Value>> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(query.table.clone()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| query.filters.iter().all(|f| matches(row, f)));
        *rows = kept;
        Ok(removed)
    }

    async fn rpc(&self, name: &str, params: Value) -> DbResult<Value> {
        self.rpc_calls
            .lock()
            .unwrap()
            .push((name.to_string(), params.clone()));
        let procedures = self.procedures.lock().unwrap();
        match procedures.get(name) {
            Some(handler) => handler(&params),
            None => Err(BaseError::NotFound(Some(format!("procedure {} not found", name)))),
        }
    }
}
