//! Service-area boundary polygon and its GeoJSON loader.

use super::coord::Coordinate;
use super::geometry::{distance_to_path, point_in_polygon};
use crate::error::FetchError;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{GeoJson, Geometry, Value};

/// An immutable multi-ring polygon describing where new gems may be created.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    name: Option<String>,
    shape: MultiPolygon<f64>,
}

impl BoundaryPolygon {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        Self { name: None, shape }
    }

    /// Builds a single-ring polygon from `[lon, lat]` pairs.
    pub fn from_ring(ring: &[[f64; 2]]) -> Self {
        let exterior: Vec<Coord<f64>> = ring.iter().map(|c| Coord { x: c[0], y: c[1] }).collect();
        Self::new(MultiPolygon(vec![Polygon::new(
            LineString::from(exterior),
            Vec::new(),
        )]))
    }

    /// Parses a GeoJSON `Feature`, `FeatureCollection` or bare geometry.
    ///
    /// Every polygon and multipolygon found is merged into one shape; other
    /// geometry types are ignored. A document with no polygonal geometry is
    /// rejected.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, FetchError> {
        let geojson: GeoJson = geojson_str
            .parse()
            .map_err(|e| FetchError::Decode(format!("Failed to parse GeoJSON: {}", e)))?;

        let mut polygons = Vec::new();
        let mut name = None;

        match geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    if name.is_none() {
                        name = feature_name(feature);
                    }
                    if let Some(g) = &feature.geometry {
                        collect_polygons(g, &mut polygons);
                    }
                }
            }
            GeoJson::Feature(f) => {
                name = feature_name(&f);
                if let Some(g) = &f.geometry {
                    collect_polygons(g, &mut polygons);
                }
            }
            GeoJson::Geometry(g) => collect_polygons(&g, &mut polygons),
        }

        if polygons.is_empty() {
            return Err(FetchError::Decode(
                "Boundary document contains no polygon geometry".to_string(),
            ));
        }

        Ok(Self {
            name,
            shape: MultiPolygon(polygons),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        point_in_polygon(point, &self.shape)
    }

    /// Distance in meters from `point` to the nearest ring edge.
    pub fn distance_to_edge(&self, point: Coordinate) -> Option<f64> {
        self.rings()
            .filter_map(|ring| distance_to_path(point, &ring))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Every ring (exteriors then holes, per part) as coordinate lists.
    pub fn rings(&self) -> impl Iterator<Item = Vec<Coordinate>> + '_ {
        self.shape.0.iter().flat_map(|poly| {
            std::iter::once(poly.exterior())
                .chain(poly.interiors())
                .map(|ring| ring.coords().map(|c| Coordinate::from(*c)).collect())
        })
    }

    /// Bounding box as `(west, south, east, north)`.
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        let mut coords = self
            .shape
            .0
            .iter()
            .flat_map(|poly| poly.exterior().coords());
        let first = coords.next()?;
        Some(coords.fold(
            (first.x, first.y, first.x, first.y),
            |(w, s, e, n), c| (w.min(c.x), s.min(c.y), e.max(c.x), n.max(c.y)),
        ))
    }
}

fn feature_name(feature: &geojson::Feature) -> Option<String> {
    feature
        .properties
        .as_ref()
        .and_then(|p| p.get("name").or_else(|| p.get("NAME")))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon<f64>>) {
    match &geometry.value {
        Value::Polygon(rings) => out.extend(rings_to_polygon(rings)),
        Value::MultiPolygon(polygons) => {
            out.extend(polygons.iter().filter_map(|rings| rings_to_polygon(rings)))
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

fn rings_to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    let to_line = |ring: &Vec<Vec<f64>>| -> LineString<f64> {
        ring.iter()
            .filter(|c| c.len() >= 2)
            .map(|c| Coord { x: c[0], y: c[1] })
            .collect::<Vec<_>>()
            .into()
    };
    let exterior = to_line(exterior);
    if exterior.0.len() < 3 {
        return None;
    }
    Some(Polygon::new(exterior, holes.iter().map(to_line).collect()))
}
