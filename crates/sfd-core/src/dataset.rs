//! Polygon datasets read from GeoJSON feature collections.
//!
//! Only `Polygon` and `MultiPolygon` geometries are accepted; both are held as
//! `MultiPolygon<f64>` so area, bounding box and intersection tests have one
//! code path. The parsed source geometry and properties are kept alongside so
//! the annotated dataset can be written back without reshaping it.

use std::path::Path;

use geo::{Area, BoundingRect, Intersects, LineString, MultiPolygon, Polygon, Rect};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, SfdError};

// ── Feature ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Feature {
    /// Source `id` rendered as a string, or the 0-based position when absent.
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub properties: Map<String, Value>,
    raw_id: Option<Value>,
    raw_geometry: Value,
}

impl Feature {
    /// Build a feature directly from geometry (tests, synthetic datasets).
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let id = id.into();
        let raw_geometry = multipolygon_to_json(&geometry);
        Self {
            raw_id: Some(Value::String(id.clone())),
            id,
            geometry,
            properties: Map::new(),
            raw_geometry,
        }
    }

    pub fn from_polygon(id: impl Into<String>, polygon: Polygon<f64>) -> Self {
        Self::new(id, MultiPolygon::new(vec![polygon]))
    }

    /// Unsigned planar area in dataset units squared.
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Exact intersection test; shared boundaries count as intersecting.
    pub fn intersects(&self, other: &Feature) -> bool {
        self.geometry.intersects(&other.geometry)
    }

    fn to_geojson(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String("Feature".into()));
        if let Some(id) = &self.raw_id {
            obj.insert("id".into(), id.clone());
        }
        obj.insert("geometry".into(), self.raw_geometry.clone());
        obj.insert("properties".into(), Value::Object(self.properties.clone()));
        Value::Object(obj)
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Dataset {
    /// Where the dataset came from (path or caller-supplied name), for messages.
    pub name: String,
    pub features: Vec<Feature>,
    /// Root members other than `type` and `features` (crs, name, bbox, ...).
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Value,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self { name: name.into(), features, extra: Map::new() }
    }

    /// Load a GeoJSON FeatureCollection. Any failure is an `InvalidDataset`.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| SfdError::InvalidDataset {
            source_name: name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_geojson_str(name, &text)
    }

    pub fn from_geojson_str(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| SfdError::InvalidDataset { source_name: name.clone(), reason };

        let raw: RawCollection =
            serde_json::from_str(text).map_err(|e| invalid(format!("not GeoJSON: {e}")))?;
        if raw.kind != "FeatureCollection" {
            return Err(invalid(format!("root type is {:?}, expected FeatureCollection", raw.kind)));
        }

        let mut features = Vec::with_capacity(raw.features.len());
        for (i, rf) in raw.features.into_iter().enumerate() {
            let geometry = parse_geometry(&rf.geometry)
                .map_err(|reason| invalid(format!("feature {i}: {reason}")))?;
            let id = match &rf.id {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => i.to_string(),
            };
            features.push(Feature {
                id,
                geometry,
                properties: rf.properties.unwrap_or_default(),
                raw_id: rf.id,
                raw_geometry: rf.geometry,
            });
        }

        Ok(Self { name, features, extra: raw.extra })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String("FeatureCollection".into()));
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }
        obj.insert(
            "features".into(),
            Value::Array(self.features.iter().map(Feature::to_geojson).collect()),
        );
        Value::Object(obj)
    }
}

// ── Geometry parsing ──────────────────────────────────────────────────────────

fn parse_geometry(v: &Value) -> std::result::Result<MultiPolygon<f64>, String> {
    let kind = v.get("type").and_then(Value::as_str).ok_or("missing geometry type")?;
    let coords = v.get("coordinates").ok_or("missing coordinates")?;
    match kind {
        "Polygon" => Ok(MultiPolygon::new(vec![parse_polygon(coords)?])),
        "MultiPolygon" => {
            let polys = coords.as_array().ok_or("MultiPolygon coordinates must be an array")?;
            let parsed = polys.iter().map(parse_polygon).collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(MultiPolygon::new(parsed))
        }
        other => Err(format!("unsupported geometry type {other}")),
    }
}

fn parse_polygon(v: &Value) -> std::result::Result<Polygon<f64>, String> {
    let rings = v.as_array().ok_or("polygon must be an array of rings")?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings.next().ok_or("polygon has no exterior ring")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(v: &Value) -> std::result::Result<LineString<f64>, String> {
    let positions = v.as_array().ok_or("ring must be an array of positions")?;
    let mut coords = Vec::with_capacity(positions.len());
    for p in positions {
        let xy = p.as_array().ok_or("position must be an array")?;
        let (Some(x), Some(y)) = (xy.first().and_then(Value::as_f64), xy.get(1).and_then(Value::as_f64))
        else {
            return Err("position needs two numeric ordinates".into());
        };
        coords.push((x, y));
    }
    Ok(LineString::from(coords))
}

fn multipolygon_to_json(mp: &MultiPolygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| -> Value {
        Value::Array(ls.coords().map(|c| serde_json::json!([c.x, c.y])).collect())
    };
    let polys: Vec<Value> = mp
        .0
        .iter()
        .map(|p| {
            let mut rings = vec![ring(p.exterior())];
            rings.extend(p.interiors().iter().map(ring));
            Value::Array(rings)
        })
        .collect();
    serde_json::json!({ "type": "MultiPolygon", "coordinates": polys })
}
