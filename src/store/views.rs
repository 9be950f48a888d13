//! Derived Views
//!
//! Read-only projections of the store state for the table and chart widgets.

use super::StoreState;
use crate::models::DateFormat;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_TABLE_HEADERS: [&str; 5] = ["ID", "URL", "Title", "Pageviews", "Date"];
pub const DEFAULT_TABLE_TITLE: &str = "Data Table";

/// One chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPoint {
    pub label: String,
    pub value: Value,
    pub date: Value,
    pub date_formatted: Option<String>,
}

impl StoreState {
    /// First `table_rows` rows, with `date` rendered per `date_format`
    pub fn table_rows_view(&self) -> Vec<Value> {
        let limit = usize::from(self.settings.table_rows);

        self.table_rows()
            .iter()
            .take(limit)
            .map(|row| {
                let mut row = row.clone();
                if self.settings.date_format == DateFormat::Human {
                    if let Some(obj) = row.as_object_mut() {
                        let formatted = obj
                            .get("date")
                            .and_then(epoch_seconds)
                            .map(|at| at.format("%b %-d, %Y, %I:%M %p").to_string());
                        if let Some(formatted) = formatted {
                            obj.insert("date".to_string(), Value::from(formatted));
                        }
                    }
                }
                row
            })
            .collect()
    }

    /// Chart points in key order, labelled `Point 1..n`
    pub fn graph_series(&self) -> Vec<GraphPoint> {
        let items: Vec<&Value> = match self.data.get("graph") {
            Some(Value::Object(points)) => {
                let mut keyed: Vec<(&String, &Value)> = points.iter().collect();
                // integer-like keys first, ascending; the rest keep map order
                keyed.sort_by_key(|(key, _)| match key.parse::<u64>() {
                    Ok(n) => (0, n),
                    Err(_) => (1, 0),
                });
                keyed.into_iter().map(|(_, item)| item).collect()
            }
            Some(Value::Array(points)) => points.iter().collect(),
            _ => Vec::new(),
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let date = item.get("date").cloned().unwrap_or(Value::Null);
                GraphPoint {
                    label: format!("Point {}", i + 1),
                    value: item.get("value").cloned().unwrap_or(Value::Null),
                    date_formatted: epoch_seconds(&date).map(|at| at.format("%b %-d").to_string()),
                    date,
                }
            })
            .collect()
    }

    pub fn table_headers(&self) -> Vec<String> {
        match self.data.pointer("/table/data/headers") {
            Some(Value::Array(headers)) => headers
                .iter()
                .map(|h| match h {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => DEFAULT_TABLE_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn table_title(&self) -> String {
        self.data
            .pointer("/table/title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TABLE_TITLE)
            .to_string()
    }

    /// Rows available before the `table_rows` limit
    pub fn total_table_rows(&self) -> usize {
        self.table_rows().len()
    }

    fn table_rows(&self) -> &[Value] {
        if let Some(Value::Array(rows)) = self.data.pointer("/table/data/rows") {
            return rows.as_slice();
        }
        match self.data.get("table") {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        }
    }
}

fn epoch_seconds(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ActionStatus;
    use serde_json::json;

    fn state_with(data: Value) -> StoreState {
        StoreState {
            data,
            ..StoreState::default()
        }
    }

    #[test]
    fn test_table_rows_view_limits_and_formats() {
        let mut state = state_with(json!({
            "table": {"data": {"rows": [
                {"id": 1, "date": 1704467040},
                {"id": 2, "date": 1704467040},
                {"id": 3, "date": 1704467040},
                {"id": 4, "date": 1704467040}
            ]}}
        }));
        state.settings.table_rows = 2;

        let rows = state.table_rows_view();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["date"], "Jan 5, 2024, 03:04 PM");
        assert_eq!(state.total_table_rows(), 4);

        state.settings.date_format = DateFormat::Timestamp;
        assert_eq!(state.table_rows_view()[1]["date"], 1704467040);
    }

    #[test]
    fn test_table_rows_from_bare_array() {
        let state = state_with(json!({"table": [{"id": 1, "date": "n/a"}], "graph": {}}));

        let rows = state.table_rows_view();
        assert_eq!(rows, vec![json!({"id": 1, "date": "n/a"})]);
    }

    #[test]
    fn test_graph_series_orders_numeric_keys() {
        let state = state_with(json!({
            "table": {},
            "graph": {
                "10": {"value": 30, "date": 1704153600},
                "2": {"value": 20, "date": 1704067200},
                "1": {"value": 10, "date": 1703980800}
            }
        }));

        let series = state.graph_series();
        let values: Vec<Value> = series.iter().map(|p| p.value.clone()).collect();
        assert_eq!(values, vec![json!(10), json!(20), json!(30)]);
        assert_eq!(series[0].label, "Point 1");
        assert_eq!(series[2].label, "Point 3");
        assert_eq!(series[0].date_formatted.as_deref(), Some("Dec 31"));
    }

    #[test]
    fn test_table_defaults() {
        let state = StoreState::default();

        assert_eq!(state.table_headers(), vec!["ID", "URL", "Title", "Pageviews", "Date"]);
        assert_eq!(state.table_title(), "Data Table");
        assert_eq!(state.total_table_rows(), 0);
        assert!(state.graph_series().is_empty());
        assert_eq!(state.status(), ActionStatus::Idle);

        let state = state_with(json!({
            "table": {"title": "Top Pages", "data": {"headers": ["Rank", "URL"]}}
        }));
        assert_eq!(state.table_headers(), vec!["Rank", "URL"]);
        assert_eq!(state.table_title(), "Top Pages");
    }
}
