//! OpenStreetMap adapter backed by the Overpass API.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use geo::{LineString, Polygon};
use uuid::Uuid;

use overpass_client::{OverpassClient, OverpassElement};
use pavescout_common::geo::polygon_centroid;
use pavescout_common::types::{BusinessRecord, GeoPoint, RawCandidateLot, SourceTag};

use crate::traits::{BusinessSource, RawLotSource};

pub struct OsmLotSource {
    client: Arc<OverpassClient>,
}

impl OsmLotSource {
    pub fn new(client: Arc<OverpassClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RawLotSource for OsmLotSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Osm
    }

    async fn fetch(&self, area: &[GeoPoint]) -> Result<Vec<RawCandidateLot>> {
        let ring: Vec<(f64, f64)> = area.iter().map(|p| (p.lat, p.lng)).collect();
        let elements = self
            .client
            .parking_lots(&ring)
            .await
            .context("Overpass parking lot query failed")?;
        Ok(elements.iter().filter_map(lot_from_element).collect())
    }
}

pub struct OsmBusinessSource {
    client: Arc<OverpassClient>,
}

impl OsmBusinessSource {
    pub fn new(client: Arc<OverpassClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusinessSource for OsmBusinessSource {
    async fn fetch(&self, area: &[GeoPoint], max: usize) -> Result<Vec<BusinessRecord>> {
        let ring: Vec<(f64, f64)> = area.iter().map(|p| (p.lat, p.lng)).collect();
        let elements = self
            .client
            .businesses(&ring, max)
            .await
            .context("Overpass business query failed")?;
        Ok(elements
            .iter()
            .filter_map(business_from_element)
            .take(max)
            .collect())
    }
}

/// Map one Overpass parking element to a raw candidate lot. Elements with
/// neither resolvable geometry nor a position are dropped.
fn lot_from_element(el: &OverpassElement) -> Option<RawCandidateLot> {
    let geometry = el
        .geometry
        .as_ref()
        .filter(|points| points.len() >= 3)
        .map(|points| {
            let ring: Vec<(f64, f64)> = points.iter().map(|p| (p.lon, p.lat)).collect();
            Polygon::new(LineString::from(ring), vec![])
        });

    let centroid = el
        .position()
        .map(|(lat, lng)| GeoPoint::new(lat, lng))
        .or_else(|| geometry.as_ref().and_then(polygon_centroid))?;

    Some(RawCandidateLot {
        source_tag: SourceTag::Osm,
        source_id: el.osm_id(),
        geometry,
        centroid,
        operator_name: el
            .tag("operator")
            .or_else(|| el.tag("name"))
            .map(str::to_string),
        address: address_from_tags(el),
        surface_type: el.tag("surface").map(str::to_string),
        capacity: el.tag("capacity").and_then(|c| c.parse().ok()),
        raw_metadata: serde_json::to_value(&el.tags).ok(),
    })
}

/// Map one Overpass POI element to a business record. Unnamed and
/// unpositioned elements are dropped, as are parking lots themselves (they
/// come back from the amenity clause of the POI query).
fn business_from_element(el: &OverpassElement) -> Option<BusinessRecord> {
    if el.tag("amenity") == Some("parking") {
        return None;
    }
    let name = el.tag("name")?.to_string();
    let (lat, lng) = el.position()?;
    let category = el
        .tag("shop")
        .or_else(|| el.tag("amenity"))
        .or_else(|| el.tag("office"))
        .map(str::to_string);

    Some(BusinessRecord {
        id: Uuid::new_v4(),
        name,
        category,
        location: GeoPoint::new(lat, lng),
    })
}

/// Assemble a display address from OSM addr:* tags.
fn address_from_tags(el: &OverpassElement) -> Option<String> {
    let street = el.tag("addr:street")?;
    let number = el.tag("addr:housenumber");
    let city = el.tag("addr:city");

    let mut address = match number {
        Some(n) => format!("{n} {street}"),
        None => street.to_string(),
    };
    if let Some(city) = city {
        address.push_str(", ");
        address.push_str(city);
    }
    Some(address)
}
