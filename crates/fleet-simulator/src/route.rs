//! Route interpolation.
//!
//! Maps normalized progress along a waypoint path to a position. Drone
//! corridors and pod routes split progress evenly across segments, so a
//! vehicle covers short segments slower than long ones. Sidewalk streets
//! are distance weighted for a constant ground speed.

use fleet_domain::{Interpolation, LatLng, Route};

/// Position at `progress` along `route`.
///
/// `None` when the route has no waypoints; the caller holds position.
pub fn position(route: &Route, progress: f64) -> Option<LatLng> {
    match route.interpolation {
        Interpolation::Uniform => uniform(&route.waypoints, progress),
        Interpolation::DistanceWeighted => RouteGeometry::new(&route.waypoints).position(progress),
    }
}

/// Equal progress share per segment.
pub fn uniform(waypoints: &[LatLng], progress: f64) -> Option<LatLng> {
    let (first, last) = (waypoints.first()?, waypoints.last()?);
    if waypoints.len() == 1 || progress.is_nan() || progress <= 0.0 {
        return Some(*first);
    }
    if progress >= 1.0 {
        return Some(*last);
    }

    let segments = waypoints.len() - 1;
    let scaled = progress * segments as f64;
    let index = (scaled.floor() as usize).min(segments - 1);
    let local = scaled - index as f64;

    Some(waypoints[index].lerp(&waypoints[index + 1], local))
}

/// Waypoints with precomputed cumulative segment lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    waypoints: Vec<LatLng>,
    /// `cumulative[i]` is the path length from the first waypoint to waypoint `i`
    cumulative: Vec<f64>,
}

impl RouteGeometry {
    pub fn new(waypoints: &[LatLng]) -> Self {
        let mut cumulative = Vec::with_capacity(waypoints.len());
        let mut total = 0.0;
        for (i, point) in waypoints.iter().enumerate() {
            if i > 0 {
                total += waypoints[i - 1].distance_to(point);
            }
            cumulative.push(total);
        }
        Self {
            waypoints: waypoints.to_vec(),
            cumulative,
        }
    }

    pub fn total_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Position after covering `progress` of the total path length.
    pub fn position(&self, progress: f64) -> Option<LatLng> {
        let (first, last) = (self.waypoints.first()?, self.waypoints.last()?);
        let total = self.total_length();
        if self.waypoints.len() == 1 || progress.is_nan() || progress <= 0.0 || total <= 0.0 {
            return Some(*first);
        }
        if progress >= 1.0 {
            return Some(*last);
        }

        let target = progress * total;
        let segment = self
            .cumulative
            .windows(2)
            .position(|pair| target <= pair[1])
            .unwrap_or(self.waypoints.len() - 2);

        let start = self.cumulative[segment];
        let length = self.cumulative[segment + 1] - start;
        let local = if length > 0.0 {
            (target - start) / length
        } else {
            0.0
        };

        Some(self.waypoints[segment].lerp(&self.waypoints[segment + 1], local))
    }
}
