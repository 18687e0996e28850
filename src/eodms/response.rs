//! Shapes of EODMS REST responses and their conversion into crate types.
use super::OrderSubmission;
use crate::download_plan::DownloadTask;
use crate::results::RawRecord;
use anyhow::{anyhow, Result};
use geo::{Geometry, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

pub const AVAILABLE_FOR_DOWNLOAD: &str = "AVAILABLE_FOR_DOWNLOAD";

#[derive(Deserialize, Debug)]
pub struct SearchResponse {
    #[serde(rename = "totalResults", default)]
    pub total_results: usize,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize, Debug)]
pub struct SearchHit {
    #[serde(rename = "recordId", default)]
    pub record_id: Value,
    #[serde(rename = "thisRecordUrl")]
    pub this_record_url: String,
}

#[derive(Deserialize, Debug)]
pub struct OrderResponse {
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize, Debug)]
pub struct OrderItem {
    #[serde(rename = "orderId", default)]
    pub order_id: Value,
    #[serde(rename = "itemId", default)]
    pub item_id: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

#[derive(Deserialize, Debug)]
pub struct Destination {
    #[serde(default)]
    pub url: Option<String>,
}

/// Ids come back as numbers or strings depending on the endpoint.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scrapes `keys` from a record metadata document: a top-level field when
/// present, otherwise the matching `[key, value]` pair of its `metadata` list.
/// Keys found in neither place are kept as nulls.
pub fn record_from_metadata(document: &Value, keys: &[&str]) -> Result<RawRecord> {
    let pairs = document
        .get("metadata")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let attributes = keys
        .iter()
        .map(|key| {
            let value = document.get(*key).cloned().or_else(|| {
                pairs.iter().find_map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([k, v, ..]) if k.as_str() == Some(*key) => Some(v.clone()),
                    _ => None,
                })
            });
            (key.to_string(), value.unwrap_or(Value::Null))
        })
        .collect();

    let geometry = document
        .get("geometry")
        .ok_or(anyhow!("Record metadata has no geometry"))?;
    let footprint = footprint_from_geojson(geometry)?;

    Ok(RawRecord {
        attributes,
        footprint,
    })
}

fn footprint_from_geojson(value: &Value) -> Result<Polygon<f64>> {
    let geometry = geojson::Geometry::from_json_value(value.clone())?;
    match Geometry::<f64>::try_from(geometry)? {
        Geometry::Polygon(polygon) => Ok(polygon),
        Geometry::MultiPolygon(mut mp) if !mp.0.is_empty() => {
            if mp.0.len() > 1 {
                debug!("Footprint has {} parts, keeping the first", mp.0.len());
            }
            Ok(mp.0.remove(0))
        }
        other => Err(anyhow!(
            "Footprint is a {}, expected a polygon",
            crate::spatial::geometry_type(&other)
        )),
    }
}

impl OrderResponse {
    pub fn submission(&self) -> OrderSubmission {
        let order_ids: BTreeSet<String> = self
            .items
            .iter()
            .filter_map(|i| id_string(&i.order_id))
            .collect();
        let item_ids: BTreeSet<String> = self
            .items
            .iter()
            .filter_map(|i| id_string(&i.item_id))
            .collect();
        OrderSubmission {
            order_ids: order_ids.into_iter().collect(),
            item_ids: item_ids.into_iter().collect(),
        }
    }

    /// One task per destination URL of every item ready for download.
    pub fn download_tasks(&self, target_dir: &Path) -> Result<Vec<DownloadTask>> {
        let mut tasks = vec![];
        for item in &self.items {
            let item_id = id_string(&item.item_id).unwrap_or_default();
            let status = item.status.as_deref().unwrap_or("UNKNOWN");
            if status != AVAILABLE_FOR_DOWNLOAD {
                warn!("Order item {} is not ready for download (status: {})", item_id, status);
                continue;
            }
            for url in item.destinations.iter().filter_map(|d| d.url.as_deref()) {
                tasks.push(DownloadTask::into_dir(&item_id, url, target_dir)?);
            }
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_document() -> Value {
        json!({
            "recordId": "13686066",
            "title": "RCM1_OK1234_PK5678_1_16M11_20210101_111111_HH_HV_GRD",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-75.0, 45.0], [-74.0, 45.0], [-74.0, 46.0], [-75.0, 46.0], [-75.0, 45.0]]]
            },
            "metadata": [
                ["Beam Mnemonic", "16M11"],
                ["Polarization", "HH HV"],
                ["Relative Orbit", "42"]
            ]
        })
    }

    #[test]
    fn test_scrapes_top_level_and_metadata_pairs() {
        let keys = ["recordId", "title", "Beam Mnemonic", "Relative Orbit", "LUT Applied"];
        let record = record_from_metadata(&record_document(), &keys).unwrap();
        assert_eq!(record.attributes.len(), 5);
        assert_eq!(record.attributes[0], ("recordId".to_string(), json!("13686066")));
        assert_eq!(record.attributes[2], ("Beam Mnemonic".to_string(), json!("16M11")));
        assert_eq!(record.attributes[3], ("Relative Orbit".to_string(), json!("42")));
        assert_eq!(record.attributes[4], ("LUT Applied".to_string(), Value::Null));
        assert_eq!(record.footprint.exterior().0.len(), 5);
    }

    #[test]
    fn test_record_without_geometry_fails() {
        let document = json!({"recordId": "1", "title": "t"});
        assert!(record_from_metadata(&document, &["recordId"]).is_err());
    }

    #[test]
    fn test_parses_search_response() {
        let response: SearchResponse = serde_json::from_value(json!({
            "moreResults": false,
            "totalResults": 2,
            "results": [
                {"recordId": "1", "thisRecordUrl": "https://example.com/record/1"},
                {"recordId": 2, "thisRecordUrl": "https://example.com/record/2"}
            ]
        }))
        .unwrap();
        assert_eq!(response.total_results, 2);
        assert_eq!(id_string(&response.results[1].record_id), Some("2".to_string()));
    }

    #[test]
    fn test_order_submission_deduplicates_ids() {
        let response: OrderResponse = serde_json::from_value(json!({
            "items": [
                {"orderId": 77, "itemId": 1001, "recordId": "1"},
                {"orderId": 77, "itemId": 1002, "recordId": "2"}
            ]
        }))
        .unwrap();
        let submission = response.submission();
        assert_eq!(submission.order_ids, vec!["77"]);
        assert_eq!(submission.item_ids, vec!["1001", "1002"]);
    }

    #[test]
    fn test_only_available_items_are_downloaded() {
        let response: OrderResponse = serde_json::from_value(json!({
            "items": [
                {"itemId": 1001, "status": "AVAILABLE_FOR_DOWNLOAD",
                 "destinations": [{"type": "https", "url": "https://example.com/dl/a.zip"}]},
                {"itemId": 1002, "status": "PROCESSING", "destinations": []}
            ]
        }))
        .unwrap();
        let tasks = response.download_tasks(Path::new("/tmp/out")).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].output(), Path::new("/tmp/out/a.zip"));
    }
}
