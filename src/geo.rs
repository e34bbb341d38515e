use crate::error::IndexError;

/// Mean earth radius in meters (spherical approximation)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude on the spherical earth
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// A geographic coordinate in decimal degrees
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    #[inline(always)]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Great-circle distance in meters (haversine)
    #[inline]
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        haversine_m(self.lat, self.lon, other.lat, other.lon)
    }

    /// Arithmetic mean of a set of points. Returns `None` for an empty set.
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<GeoPoint> {
        let mut lat = 0.0;
        let mut lon = 0.0;
        let mut n = 0usize;
        for p in points {
            lat += p.lat;
            lon += p.lon;
            n += 1;
        }
        (n > 0).then(|| GeoPoint::new(lat / n as f64, lon / n as f64))
    }
}

/// Haversine distance in meters
#[inline]
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp guards asin against rounding slightly above 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Convert a distance in meters to (lat, lon) degree spans at the given latitude.
/// The longitude span grows with latitude; near the poles it is capped at 360.
pub fn meters_to_degrees(meters: f64, at_lat: f64) -> (f64, f64) {
    let dlat = meters / METERS_PER_DEGREE;
    let cos_lat = at_lat.to_radians().cos().abs().max(1e-6);
    let dlon = (meters / (METERS_PER_DEGREE * cos_lat)).min(360.0);
    (dlat, dlon)
}

/// Axis-aligned lat/lon rectangle, edges inclusive
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    /// Checked constructor; rejects NaN/infinite edges and normalizes edge order
    pub fn try_new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, IndexError> {
        if ![south, west, north, east].iter().all(|v| v.is_finite()) {
            return Err(IndexError::NonFinite { south, west, north, east });
        }
        Ok(Self::new(south.min(north), west.min(east), south.max(north), west.max(east)))
    }

    /// The whole world
    pub const fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    /// Degenerate single-point region
    pub const fn point(p: GeoPoint) -> Self {
        Self::new(p.lat, p.lon, p.lat, p.lon)
    }

    /// Smallest bounds containing every point, or `None` if there are none
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Self::point(*first);
        for p in iter {
            b.south = b.south.min(p.lat);
            b.north = b.north.max(p.lat);
            b.west = b.west.min(p.lon);
            b.east = b.east.max(p.lon);
        }
        Some(b)
    }

    /// Rectangle enclosing a circle of `meters` around `center`
    /// Longitude wrap-around at the antimeridian is not handled.
    pub fn around(center: GeoPoint, meters: f64) -> Self {
        const EPS: f64 = 1e-9;
        let angular = meters.max(0.0) / EARTH_RADIUS_M;
        let dlat = angular.to_degrees() + EPS;
        // Widest longitude offset of a spherical circle: asin(sin r / cos lat)
        let ratio = angular.sin() / center.lat.to_radians().cos();
        let dlon = if angular >= std::f64::consts::FRAC_PI_2 || !(0.0..1.0).contains(&ratio) {
            180.0
        } else {
            ratio.asin().to_degrees() + EPS
        };
        Self::new(center.lat - dlat, center.lon - dlon, center.lat + dlat, center.lon + dlon)
    }

    #[inline(always)]
    pub fn contains(&self, p: &GeoPoint) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }

    #[inline(always)]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.south <= other.north
            && self.north >= other.south
            && self.west <= other.east
            && self.east >= other.west
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Grow each side by `fraction` of the span (0.1 = 10% margin)
    pub fn expand(&self, fraction: f64) -> Self {
        let dlat = self.height() * fraction;
        let dlon = self.width() * fraction;
        Self::new(self.south - dlat, self.west - dlon, self.north + dlat, self.east + dlon)
    }

    /// Midpoints of the four edges (north, east, south, west)
    pub fn edge_midpoints(&self) -> [GeoPoint; 4] {
        let c = self.center();
        [
            GeoPoint::new(self.north, c.lon),
            GeoPoint::new(c.lat, self.east),
            GeoPoint::new(self.south, c.lon),
            GeoPoint::new(c.lat, self.west),
        ]
    }

    /// Split into four equal quadrants (NW, NE, SW, SE)
    pub fn quadrants(&self) -> [Bounds; 4] {
        let c = self.center();
        [
            Bounds::new(c.lat, self.west, self.north, c.lon),
            Bounds::new(c.lat, c.lon, self.north, self.east),
            Bounds::new(self.south, self.west, c.lat, c.lon),
            Bounds::new(self.south, c.lon, c.lat, self.east),
        ]
    }
}
