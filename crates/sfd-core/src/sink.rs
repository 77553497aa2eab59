//! Result sinks: where per-region records end up.
//!
//! The attribute schema is static and checked once up front
//! ([`ResultSink::ensure_fields`]); after that each region is written with a
//! single typed [`RegionRecord`], all five fields or none.

use std::path::Path;

use serde_json::{Number, Value};

use crate::aggregate::RegionRecord;
use crate::dataset::Dataset;
use crate::error::{Result, SfdError};

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Double,
}

impl FieldType {
    fn accepts(self, v: &Value) -> bool {
        match (self, v) {
            (_, Value::Null) => true,
            (FieldType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Double, Value::Number(_)) => true,
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldType::Int => "Int",
            FieldType::Double => "Double",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<(&'static str, FieldType)>,
}

impl Schema {
    /// Attribute columns written for every processed region.
    pub fn region_record() -> Self {
        Self {
            fields: vec![
                ("density", FieldType::Int),
                ("bval", FieldType::Double),
                ("aval", FieldType::Double),
                ("bval_FD", FieldType::Double),
                ("aval_FD", FieldType::Double),
            ],
        }
    }
}

/// Typed record → attribute values, in schema order. Fails before anything
/// is written if a value cannot be stored.
fn record_values(record: &RegionRecord) -> Result<[(&'static str, Value); 5]> {
    let double = |name: &'static str, v: f64| -> Result<(&'static str, Value)> {
        Number::from_f64(v)
            .map(|n| (name, Value::Number(n)))
            .ok_or_else(|| SfdError::Sink(format!("{name} = {v} is not storable")))
    };
    if !record.density.is_finite() {
        return Err(SfdError::Sink(format!("density = {} is not storable", record.density)));
    }
    // Int column: truncate toward zero at the storage boundary.
    let density = ("density", Value::Number(Number::from(record.density.trunc() as i64)));
    Ok([
        density,
        double("bval", record.bval)?,
        double("aval", record.a)?,
        double("bval_FD", record.bval_fd)?,
        double("aval_FD", record.aval_fd)?,
    ])
}

// ── Sink trait ────────────────────────────────────────────────────────────────

pub trait ResultSink {
    /// Declare the attribute columns. Must be called before any write.
    fn ensure_fields(&mut self, schema: &Schema) -> Result<()>;

    /// Store one region's record atomically. Regions are addressed by their
    /// position in the dataset; `region_id` must match the feature there.
    fn write_record(&mut self, region_index: usize, region_id: &str, record: &RegionRecord) -> Result<()>;
}

// ── GeoJSON sink ──────────────────────────────────────────────────────────────

/// Writes records onto the region dataset's feature properties.
pub struct GeoJsonSink {
    dataset: Dataset,
    schema: Option<Schema>,
    written: usize,
}

impl GeoJsonSink {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset, schema: None, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Serialise the annotated dataset to `path`.
    pub fn finish(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.dataset.to_geojson())?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl ResultSink for GeoJsonSink {
    fn ensure_fields(&mut self, schema: &Schema) -> Result<()> {
        for feature in &self.dataset.features {
            for &(name, ty) in &schema.fields {
                if let Some(existing) = feature.properties.get(name) {
                    if !ty.accepts(existing) {
                        return Err(SfdError::Schema {
                            field: name.to_string(),
                            existing: format!("{existing} on feature {}", feature.id),
                            wanted: ty.name().to_string(),
                        });
                    }
                }
            }
        }
        for feature in &mut self.dataset.features {
            for &(name, _) in &schema.fields {
                feature.properties.entry(name).or_insert(Value::Null);
            }
        }
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn write_record(&mut self, region_index: usize, region_id: &str, record: &RegionRecord) -> Result<()> {
        if self.schema.is_none() {
            return Err(SfdError::Sink("write before ensure_fields".into()));
        }
        let values = record_values(record)?;
        let feature = self
            .dataset
            .features
            .get_mut(region_index)
            .ok_or_else(|| SfdError::Sink(format!("no region at position {region_index}")))?;
        if feature.id != region_id {
            return Err(SfdError::Sink(format!(
                "region {region_index} is {:?}, record is for {region_id:?}",
                feature.id
            )));
        }
        for (name, v) in values {
            feature.properties.insert(name.to_string(), v);
        }
        self.written += 1;
        Ok(())
    }
}

// ── In-memory sink ────────────────────────────────────────────────────────────

/// Keeps records in write order. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub schema: Option<Schema>,
    /// `(dataset position, region id, record)` in write order.
    pub records: Vec<(usize, String, RegionRecord)>,
}

impl MemorySink {
    pub fn get(&self, region_index: usize) -> Option<&RegionRecord> {
        self.records.iter().find(|(i, _, _)| *i == region_index).map(|(_, _, r)| r)
    }
}

impl ResultSink for MemorySink {
    fn ensure_fields(&mut self, schema: &Schema) -> Result<()> {
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn write_record(&mut self, region_index: usize, region_id: &str, record: &RegionRecord) -> Result<()> {
        if self.schema.is_none() {
            return Err(SfdError::Sink("write before ensure_fields".into()));
        }
        record_values(record)?;
        self.records.push((region_index, region_id.to_string(), *record));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Feature;
    use geo::polygon;

    fn one_region() -> Dataset {
        let f = Feature::from_polygon("s1", polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]);
        Dataset::new("mem", vec![f])
    }

    fn record() -> RegionRecord {
        RegionRecord { density: 1234.9, a: 5.0, bval: -2.0, aval_fd: 7.0, bval_fd: -3.0 }
    }

    #[test]
    fn ensure_fields_adds_null_columns() {
        let mut sink = GeoJsonSink::new(one_region());
        sink.ensure_fields(&Schema::region_record()).unwrap();
        let props = &sink.dataset().features[0].properties;
        for (name, _) in Schema::region_record().fields {
            assert_eq!(props[name], Value::Null);
        }
    }

    #[test]
    fn write_truncates_density_and_sets_all_fields() {
        let mut sink = GeoJsonSink::new(one_region());
        sink.ensure_fields(&Schema::region_record()).unwrap();
        sink.write_record(0, "s1", &record()).unwrap();
        let props = &sink.dataset().features[0].properties;
        assert_eq!(props["density"], 1234);
        assert_eq!(props["aval"], 5.0);
        assert_eq!(props["bval"], -2.0);
        assert_eq!(props["aval_FD"], 7.0);
        assert_eq!(props["bval_FD"], -3.0);
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn non_finite_value_writes_nothing() {
        let mut sink = GeoJsonSink::new(one_region());
        sink.ensure_fields(&Schema::region_record()).unwrap();
        let bad = RegionRecord { bval_fd: f64::NAN, ..record() };
        assert!(matches!(sink.write_record(0, "s1", &bad), Err(SfdError::Sink(_))));
        let props = &sink.dataset().features[0].properties;
        assert_eq!(props["density"], Value::Null);
        assert_eq!(sink.written(), 0);
    }

    #[test]
    fn conflicting_existing_field_is_schema_error() {
        let mut ds = one_region();
        ds.features[0].properties.insert("density".into(), Value::String("high".into()));
        let mut sink = GeoJsonSink::new(ds);
        assert!(matches!(sink.ensure_fields(&Schema::region_record()), Err(SfdError::Schema { .. })));
    }

    #[test]
    fn unknown_region_and_early_write_are_rejected() {
        let mut sink = GeoJsonSink::new(one_region());
        assert!(sink.write_record(0, "s1", &record()).is_err());
        sink.ensure_fields(&Schema::region_record()).unwrap();
        assert!(sink.write_record(1, "s1", &record()).is_err());
        assert!(sink.write_record(0, "nope", &record()).is_err());
        assert_eq!(sink.written(), 0);
    }

    #[test]
    fn colliding_ids_are_written_by_position() {
        // No id → position "1"; explicit numeric id 1 → "1" as well.
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","id":1,"properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}]}"#;
        let ds = Dataset::from_geojson_str("mixed", text).unwrap();
        assert_eq!(ds.features[1].id, ds.features[2].id);

        let mut sink = GeoJsonSink::new(ds);
        sink.ensure_fields(&Schema::region_record()).unwrap();
        sink.write_record(1, "1", &RegionRecord { density: 300.0, ..record() }).unwrap();
        sink.write_record(2, "1", &RegionRecord { density: 600.0, ..record() }).unwrap();
        let f = &sink.dataset().features;
        assert_eq!(f[0].properties["density"], Value::Null);
        assert_eq!(f[1].properties["density"], 300);
        assert_eq!(f[2].properties["density"], 600);
    }

    #[test]
    fn finish_writes_readable_geojson() {
        let mut sink = GeoJsonSink::new(one_region());
        sink.ensure_fields(&Schema::region_record()).unwrap();
        sink.write_record(0, "s1", &record()).unwrap();
        let path = std::env::temp_dir().join(format!("sfd_sink_{}.geojson", std::process::id()));
        sink.finish(&path).unwrap();
        let back = Dataset::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.features[0].properties["density"], 1234);
    }
}
