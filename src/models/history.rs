//! Historial acotado por vehículo
//!
//! Las entradas se guardan de más reciente a más antigua, sin timestamps
//! repetidos y con un máximo de `HISTORY_RETENTION_CAP` por vehículo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Máximo de muestras retenidas por vehículo
pub const HISTORY_RETENTION_CAP: usize = 5000;

/// Tamaño por defecto de una consulta de historial
pub const DEFAULT_HISTORY_LIMIT: i64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Muestra cruda tal como llegó
    pub sample: Value,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, sample: Value) -> Self {
        Self { timestamp, sample }
    }
}

/// Insertar una muestra en un historial ordenado (más reciente primero).
///
/// Devuelve `false` si el timestamp ya existía o si la muestra quedó fuera
/// del límite por ser más antigua que todo lo retenido.
pub fn retain_sample(history: &mut Vec<HistoryEntry>, entry: HistoryEntry, cap: usize) -> bool {
    if history.iter().any(|e| e.timestamp == entry.timestamp) {
        return false;
    }

    let position = history.partition_point(|e| e.timestamp > entry.timestamp);
    history.insert(position, entry);

    if history.len() > cap {
        history.truncate(cap);
        return position < cap;
    }
    true
}

/// Filtros de `GET /vehicles/:id/history`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 5000))]
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn matches(&self, timestamp: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *timestamp >= from) && self.to.map_or(true, |to| *timestamp <= to)
    }
}

/// Aplicar una consulta sobre un historial ya ordenado
pub fn select_history(history: &[HistoryEntry], query: &HistoryQuery) -> Vec<HistoryEntry> {
    history
        .iter()
        .filter(|e| query.matches(&e.timestamp))
        .take(query.effective_limit().max(0) as usize)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_duplicate_timestamp_is_ignored() {
        let mut history = Vec::new();
        assert!(retain_sample(&mut history, HistoryEntry::new(at(1), json!({"speed": 1})), 10));
        assert!(!retain_sample(&mut history, HistoryEntry::new(at(1), json!({"speed": 2})), 10));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sample["speed"], json!(1));
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut history = Vec::new();
        for minute in [5, 1, 9, 3] {
            retain_sample(&mut history, HistoryEntry::new(at(minute), json!({})), 10);
        }
        let order: Vec<_> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(order, vec![at(9), at(5), at(3), at(1)]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = Vec::new();
        for minute in 0..=(HISTORY_RETENTION_CAP as i64) {
            retain_sample(&mut history, HistoryEntry::new(at(minute), json!({})), HISTORY_RETENTION_CAP);
        }
        assert_eq!(history.len(), HISTORY_RETENTION_CAP);
        assert_eq!(history.first().map(|e| e.timestamp), Some(at(HISTORY_RETENTION_CAP as i64)));
        // la muestra del minuto 0 fue desalojada
        assert_eq!(history.last().map(|e| e.timestamp), Some(at(1)));
    }

    #[test]
    fn test_sample_older_than_full_history_is_dropped() {
        let mut history = Vec::new();
        for minute in 10..13 {
            retain_sample(&mut history, HistoryEntry::new(at(minute), json!({})), 3);
        }
        assert!(!retain_sample(&mut history, HistoryEntry::new(at(1), json!({})), 3));
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().map(|e| e.timestamp), Some(at(10)));
    }

    #[test]
    fn test_select_history_window_and_limit() {
        let mut history = Vec::new();
        for minute in 0..10 {
            retain_sample(&mut history, HistoryEntry::new(at(minute), json!({})), 100);
        }
        let query = HistoryQuery {
            from: Some(at(2)),
            to: Some(at(7)),
            limit: Some(3),
        };
        let selected: Vec<_> = select_history(&history, &query).into_iter().map(|e| e.timestamp).collect();
        assert_eq!(selected, vec![at(7), at(6), at(5)]);
    }

    #[test]
    fn test_history_query_validation() {
        assert!(HistoryQuery { limit: Some(0), ..Default::default() }.validate().is_err());
        assert!(HistoryQuery { limit: Some(5001), ..Default::default() }.validate().is_err());
        assert!(HistoryQuery { limit: Some(5000), ..Default::default() }.validate().is_ok());
        assert_eq!(HistoryQuery::default().effective_limit(), DEFAULT_HISTORY_LIMIT);
    }
}
