//! Geometry primitives for raw places and indexed documents.
//!
//! Coordinates are WGS84 `(lon, lat)` pairs. Planar operations (length,
//! length-indexed extraction, centroids) work in coordinate units, which is
//! what house-number interpolation along short street segments needs. Real
//! distances between points use the haversine formula.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// True when the coordinate lies inside the WGS84 value range.
    pub fn is_valid(&self) -> bool {
        (-180.0..=180.0).contains(&self.lon) && (-90.0..=90.0).contains(&self.lat)
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }

    fn planar_distance(&self, other: &Self) -> f64 {
        (other.lon - self.lon).hypot(other.lat - self.lat)
    }

    const fn as_pair(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    const fn from_pair(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Envelope {
    pub fn new(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Self {
        Self {
            min_lon: lon1.min(lon2),
            min_lat: lat1.min(lat2),
            max_lon: lon1.max(lon2),
            max_lat: lat1.max(lat2),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::new(p.lon, p.lat, p.lon, p.lat),
                Some(env) => Self {
                    min_lon: env.min_lon.min(p.lon),
                    min_lat: env.min_lat.min(p.lat),
                    max_lon: env.max_lon.max(p.lon),
                    max_lat: env.max_lat.max(p.lat),
                },
            })
        })
    }

    pub fn area(&self) -> f64 {
        (self.max_lon - self.min_lon) * (self.max_lat - self.min_lat)
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.lon)
            && (self.min_lat..=self.max_lat).contains(&point.lat)
    }

    pub fn is_valid(&self) -> bool {
        Point::new(self.min_lon, self.min_lat).is_valid()
            && Point::new(self.max_lon, self.max_lat).is_valid()
    }
}

/// GeoJSON geometry, as stored in dumps and returned with hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl Geometry {
    pub fn from_geojson(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_geojson(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub const fn is_point(&self) -> bool {
        matches!(self, Self::Point(_))
    }

    fn points(&self) -> Vec<Point> {
        match self {
            Self::Point(p) => vec![Point::from_pair(*p)],
            Self::LineString(line) => line.iter().copied().map(Point::from_pair).collect(),
            Self::Polygon(rings) => rings
                .iter()
                .flatten()
                .copied()
                .map(Point::from_pair)
                .collect(),
            Self::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .flatten()
                .copied()
                .map(Point::from_pair)
                .collect(),
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_points(&self.points())
    }

    pub fn centroid(&self) -> Option<Point> {
        match self {
            Self::Point(p) => Some(Point::from_pair(*p)),
            Self::LineString(_) => self.as_line_string().and_then(|l| l.centroid()),
            Self::Polygon(rings) => rings.first().and_then(|outer| ring_centroid(outer)).map(|(c, _)| c),
            Self::MultiPolygon(polys) => {
                let weighted: Vec<(Point, f64)> = polys
                    .iter()
                    .filter_map(|rings| rings.first().and_then(|outer| ring_centroid(outer)))
                    .collect();
                let total: f64 = weighted.iter().map(|(_, a)| a).sum();
                if total == 0.0 {
                    return weighted.first().map(|(c, _)| *c);
                }
                let (lon, lat) = weighted.iter().fold((0.0, 0.0), |(lon, lat), (c, a)| {
                    (lon + c.lon * a, lat + c.lat * a)
                });
                Some(Point::new(lon / total, lat / total))
            }
        }
    }

    /// The geometry as a line, if it is one.
    pub fn as_line_string(&self) -> Option<LineString> {
        match self {
            Self::LineString(coords) => Some(LineString::new(
                coords.iter().copied().map(Point::from_pair).collect(),
            )),
            _ => None,
        }
    }
}

impl From<Point> for Geometry {
    fn from(point: Point) -> Self {
        Self::Point(point.as_pair())
    }
}

impl From<&LineString> for Geometry {
    fn from(line: &LineString) -> Self {
        Self::LineString(line.points.iter().map(|p| p.as_pair()).collect())
    }
}

/// Area-weighted centroid of a closed ring (shoelace). Degenerate rings fall
/// back to the vertex mean with zero weight.
fn ring_centroid(ring: &[[f64; 2]]) -> Option<(Point, f64)> {
    if ring.is_empty() {
        return None;
    }
    let mut area = 0.0;
    let (mut cx, mut cy) = (0.0, 0.0);
    for window in ring.windows(2) {
        let ([x0, y0], [x1, y1]) = (window[0], window[1]);
        let cross = x0 * y1 - x1 * y0;
        area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    area /= 2.0;

    if area.abs() < f64::EPSILON {
        let n = ring.len() as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
        return Some((Point::new(sx / n, sy / n), 0.0));
    }

    Some((Point::new(cx / (6.0 * area), cy / (6.0 * area)), area.abs()))
}

/// A polyline with planar, length-indexed access.
#[derive(Debug, Clone, PartialEq)]
pub struct LineString {
    points: Vec<Point>,
}

impl LineString {
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].planar_distance(&w[1]))
            .sum()
    }

    /// Point at `index` units along the line. The index is clamped to
    /// `[0, length]`.
    pub fn point_at(&self, index: f64) -> Option<Point> {
        let first = *self.points.first()?;
        let mut remaining = index.max(0.0);

        for w in self.points.windows(2) {
            let seg_len = w[0].planar_distance(&w[1]);
            if remaining <= seg_len {
                if seg_len == 0.0 {
                    return Some(w[0]);
                }
                let frac = remaining / seg_len;
                return Some(Point::new(
                    w[0].lon + (w[1].lon - w[0].lon) * frac,
                    w[0].lat + (w[1].lat - w[0].lat) * frac,
                ));
            }
            remaining -= seg_len;
        }

        Some(self.points.last().copied().unwrap_or(first))
    }

    /// Length-weighted mean of the segment midpoints.
    pub fn centroid(&self) -> Option<Point> {
        let first = *self.points.first()?;
        let total = self.length();
        if total == 0.0 {
            return Some(first);
        }

        let (lon, lat) = self.points.windows(2).fold((0.0, 0.0), |(lon, lat), w| {
            let len = w[0].planar_distance(&w[1]);
            (
                lon + (w[0].lon + w[1].lon) / 2.0 * len,
                lat + (w[0].lat + w[1].lat) / 2.0 * len,
            )
        });
        Some(Point::new(lon / total, lat / total))
    }

    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_points(&self.points)
    }

    /// Smallest planar distance from `point` to any segment.
    pub fn distance_to(&self, point: &Point) -> f64 {
        if self.points.len() == 1 {
            return self.points[0].planar_distance(point);
        }
        self.points
            .windows(2)
            .map(|w| segment_distance(&w[0], &w[1], point))
            .fold(f64::INFINITY, f64::min)
    }
}

fn segment_distance(a: &Point, b: &Point, p: &Point) -> f64 {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return a.planar_distance(p);
    }
    let t = (((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / len_sq).clamp(0.0, 1.0);
    Point::new(a.lon + t * dx, a.lat + t * dy).planar_distance(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Berlin -> Hamburg is roughly 255 km
        let berlin = Point::new(13.405, 52.52);
        let hamburg = Point::new(9.9937, 53.5511);
        let d = berlin.haversine_km(&hamburg);
        assert!((250.0..260.0).contains(&d), "unexpected distance {d}");
        assert!(berlin.haversine_km(&berlin).abs() < 1e-9);
    }

    #[test]
    fn test_line_point_at_and_length() {
        let line = LineString::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert!((line.length() - 2.0).abs() < 1e-12);
        assert_eq!(line.point_at(0.5), Some(Point::new(0.5, 0.0)));
        assert_eq!(line.point_at(1.5), Some(Point::new(1.0, 0.5)));
        assert_eq!(line.point_at(5.0), Some(Point::new(1.0, 1.0)));
        assert_eq!(line.point_at(-1.0), Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_line_centroid_is_length_weighted() {
        let line = LineString::new(vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0)]);
        assert_eq!(line.centroid(), Some(Point::new(1.0, 0.0)));
    }

    #[test]
    fn test_polygon_centroid_and_envelope() {
        let square = Geometry::Polygon(vec![vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 2.0],
            [0.0, 2.0],
            [0.0, 0.0],
        ]]);
        let c = square.centroid().unwrap();
        assert!((c.lon - 1.0).abs() < 1e-12 && (c.lat - 1.0).abs() < 1e-12);

        let env = square.envelope().unwrap();
        assert_eq!(env, Envelope::new(0.0, 0.0, 2.0, 2.0));
        assert!((env.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_geojson_roundtrip_shape() {
        let geom = Geometry::from_geojson(r#"{"type":"LineString","coordinates":[[1,2],[3,4]]}"#)
            .unwrap();
        assert_eq!(geom, Geometry::LineString(vec![[1.0, 2.0], [3.0, 4.0]]));
        assert!(geom.to_geojson().unwrap().contains("\"type\":\"LineString\""));
    }

    #[test]
    fn test_distance_to_line() {
        let line = LineString::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert!(line.distance_to(&Point::new(5.0, 0.0)) < 1e-12);
        assert!((line.distance_to(&Point::new(5.0, 3.0)) - 3.0).abs() < 1e-12);
    }
}
