use serde::{Deserialize, Serialize};

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds a coordinate from a wire point, which is ordered `[lon, lat]`.
    pub fn from_lon_lat(point: [f64; 2]) -> Self {
        Self {
            lat: point[1],
            lon: point[0],
        }
    }

    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Planar distance in degrees with the longitude axis scaled by latitude.
    pub fn approx_distance_deg(&self, other: &LatLon) -> f64 {
        let mean_lat = ((self.lat + other.lat) * 0.5).to_radians();
        let dx = (self.lon - other.lon) * mean_lat.cos();
        let dy = self.lat - other.lat;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &LatLon, t: f64) -> LatLon {
        LatLon {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

/// Axis-aligned geographic bounds used by the console viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub fn contains(&self, point: &LatLon) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lon + self.max_lon) * 0.5,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        // Ujjain operating area served by the simulation.
        Self {
            min_lon: 75.7264,
            min_lat: 23.1324,
            max_lon: 75.8264,
            max_lat: 23.2324,
        }
    }
}
