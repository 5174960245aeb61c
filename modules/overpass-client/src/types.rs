use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level Overpass API response envelope.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One OSM element (node, way, or relation) from an Overpass result set.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    pub id: u64,
    #[serde(rename = "type")]
    pub element_type: String,
    /// Node coordinates (absent for ways and relations).
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Way/relation centroid, present when the query asks for `center`.
    pub center: Option<OverpassPoint>,
    /// Full way geometry, present when the query asks for `geom`.
    pub geometry: Option<Vec<OverpassPoint>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OverpassElement {
    /// Stable OSM-style identifier, e.g. `way/123456`.
    pub fn osm_id(&self) -> String {
        format!("{}/{}", self.element_type, self.id)
    }

    /// Best-known representative point for the element: explicit center for
    /// ways/relations, own coordinates for nodes.
    pub fn position(&self) -> Option<(f64, f64)> {
        if let Some(c) = &self.center {
            return Some((c.lat, c.lon));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// A lat/lon pair as Overpass serializes geometry points.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverpassPoint {
    pub lat: f64,
    pub lon: f64,
}
