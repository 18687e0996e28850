//! Tabular view of a search result set.
use crate::error::Error;
use crate::spatial::{Crs, FootprintTransformer};
use geo::Polygon;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

pub const RECORD_ID_COLUMN: &str = "EODMS RecordId";
pub const TITLE_COLUMN: &str = "Granule";
pub const GEOMETRY_COLUMN: &str = "geometry";

const SERVICE_RECORD_ID: &str = "recordId";
const SERVICE_TITLE: &str = "title";

/// One record as scraped from the service: attributes in scrape order and a
/// footprint in the service's reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub attributes: Vec<(String, Value)>,
    pub footprint: Polygon<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub index: usize,
    pub record_id: String,
    pub title: String,
    pub footprint: Polygon<f64>,
    /// Remaining attributes, keyed by their public column names.
    pub attributes: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    crs: Crs,
    records: Vec<ResultRecord>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Numeric ids order numerically ahead of any others, which order lexically.
fn compare_record_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl ResultTable {
    /// Builds the table from a complete batch of records. Footprints are
    /// transformed from `source_crs` to `target_crs` when one is given.
    pub fn build(
        raw_records: Vec<RawRecord>,
        source_crs: &Crs,
        target_crs: Option<&Crs>,
    ) -> Result<Self, Error> {
        let transformer = FootprintTransformer::new(source_crs, target_crs)?;

        let mut records = Vec::with_capacity(raw_records.len());
        for raw in raw_records {
            let footprint = transformer.apply(raw.footprint)?;
            let mut record_id = String::new();
            let mut title = String::new();
            let mut attributes = vec![];
            for (key, value) in raw.attributes {
                match key.as_str() {
                    SERVICE_RECORD_ID => record_id = value_to_string(&value),
                    SERVICE_TITLE => title = value_to_string(&value),
                    _ => attributes.push((key, value)),
                }
            }
            records.push(ResultRecord {
                index: 0,
                record_id,
                title,
                footprint,
                attributes,
            });
        }

        // stable: equal ids keep response order
        records.sort_by(|a, b| compare_record_ids(&a.record_id, &b.record_id));
        for (index, record) in records.iter_mut().enumerate() {
            record.index = index;
        }

        Ok(Self {
            crs: target_crs.cloned().unwrap_or_else(|| source_crs.clone()),
            records,
        })
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.record_id.clone()).collect()
    }

    /// Column names in display order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![RECORD_ID_COLUMN.to_string(), TITLE_COLUMN.to_string()];
        for record in &self.records {
            for (key, _) in &record.attributes {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns.push(GEOMETRY_COLUMN.to_string());
        columns
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .records
            .iter()
            .map(|record| {
                let mut properties = JsonObject::new();
                properties.insert(RECORD_ID_COLUMN.to_string(), Value::from(record.record_id.clone()));
                properties.insert(TITLE_COLUMN.to_string(), Value::from(record.title.clone()));
                for (key, value) in &record.attributes {
                    properties.insert(key.clone(), value.clone());
                }
                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.footprint))),
                    id: Some(geojson::feature::Id::Number(record.index.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let foreign_members = if self.crs.is_search_crs() {
            None
        } else {
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({"type": "name", "properties": {"name": self.crs.as_str()}}),
            );
            Some(members)
        };

        FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        }
    }

    pub fn write_geojson<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.to_feature_collection())?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;
    use geojson::GeoJson;

    fn square(x: f64, y: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0), (x, y)]),
            vec![],
        )
    }

    fn raw(id: &str, title: &str) -> RawRecord {
        RawRecord {
            attributes: vec![
                ("recordId".to_string(), Value::from(id)),
                ("title".to_string(), Value::from(title)),
                ("Beam Mnemonic".to_string(), Value::from("16M11")),
            ],
            footprint: square(-75.0, 45.0),
        }
    }

    #[test]
    fn test_sorted_and_reindexed() {
        let input = vec![raw("300", "c"), raw("20", "b"), raw("1000", "d"), raw("5", "a")];
        let table = ResultTable::build(input, &Crs::search(), None).unwrap();
        assert_eq!(table.record_ids(), vec!["5", "20", "300", "1000"]);
        let indices: Vec<usize> = table.records().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_order_independent() {
        let forward = vec![raw("1", "a"), raw("2", "b"), raw("3", "c")];
        let backward = vec![raw("3", "c"), raw("2", "b"), raw("1", "a")];
        let a = ResultTable::build(forward, &Crs::search(), None).unwrap();
        let b = ResultTable::build(backward, &Crs::search(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ties_keep_response_order() {
        let input = vec![raw("7", "first"), raw("3", "x"), raw("7", "second")];
        let table = ResultTable::build(input, &Crs::search(), None).unwrap();
        let titles: Vec<&str> = table.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["x", "first", "second"]);
    }

    #[test]
    fn test_columns_renamed() {
        let table = ResultTable::build(vec![raw("1", "a")], &Crs::search(), None).unwrap();
        assert_eq!(
            table.columns(),
            vec!["EODMS RecordId", "Granule", "Beam Mnemonic", "geometry"]
        );
    }

    #[test]
    fn test_numeric_record_ids_are_stringified() {
        let record = RawRecord {
            attributes: vec![("recordId".to_string(), Value::from(13686066))],
            footprint: square(0.0, 0.0),
        };
        let table = ResultTable::build(vec![record], &Crs::search(), None).unwrap();
        assert_eq!(table.record_ids(), vec!["13686066"]);
    }

    #[test]
    fn test_footprints_transformed_to_target() {
        let target = Crs::new("EPSG:3857");
        let table = ResultTable::build(vec![raw("1", "a")], &Crs::search(), Some(&target)).unwrap();
        assert_eq!(table.crs(), &target);
        assert!(table.records()[0].footprint.exterior().0[0].x < -8_000_000.0);
    }

    #[test]
    fn test_empty_input_is_empty_table() {
        let table = ResultTable::build(vec![], &Crs::search(), None).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_geojson_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query_results.geojson");
        let input = vec![raw("2", "b"), raw("1", "a")];
        let table = ResultTable::build(input, &Crs::search(), None).unwrap();
        table.write_geojson(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let fc = match content.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            _ => panic!("expected a feature collection"),
        };
        assert_eq!(fc.features.len(), 2);
        let first = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(first["EODMS RecordId"], Value::from("1"));
        assert_eq!(first["Granule"], Value::from("a"));
        assert!(fc.foreign_members.is_none());
    }

    #[test]
    fn test_geojson_export_records_crs() {
        let target = Crs::new("EPSG:3857");
        let table = ResultTable::build(vec![raw("1", "a")], &Crs::search(), Some(&target)).unwrap();
        let fc = table.to_feature_collection();
        let members = fc.foreign_members.unwrap();
        assert_eq!(members["crs"]["properties"]["name"], Value::from("EPSG:3857"));
    }
}
