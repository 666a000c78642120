use std::f64::consts::PI;

use crate::models::{Coords, WorkoutType};

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
pub const MIN_ZOOM: u8 = 2;
pub const MAX_ZOOM: u8 = 19;

/// Opaque reference to a placed marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Popup class of a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerStyle {
    RunningPopup,
    CyclingPopup,
}

impl MarkerStyle {
    pub fn class_name(self) -> &'static str {
        match self {
            MarkerStyle::RunningPopup => "running-popup",
            MarkerStyle::CyclingPopup => "cycling-popup",
        }
    }
}

impl From<WorkoutType> for MarkerStyle {
    fn from(kind: WorkoutType) -> Self {
        match kind {
            WorkoutType::Running => MarkerStyle::RunningPopup,
            WorkoutType::Cycling => MarkerStyle::CyclingPopup,
        }
    }
}

pub type ClickHandler = Box<dyn FnMut(Coords)>;

/// The operations the app needs from an interactive map.
pub trait MapWidget {
    fn init(center: Coords, zoom: u8) -> Self;

    /// Called with the clicked position on every map click.
    fn on_click(&mut self, handler: ClickHandler);

    fn add_marker(&mut self, coords: Coords, popup: &str, style: MarkerStyle) -> MarkerHandle;

    fn remove_marker(&mut self, marker: MarkerHandle);

    fn pan_to(&mut self, coords: Coords, zoom: u8);
}

/// Web-Mercator world pixel coordinates of `coords` at `zoom`.
pub fn project(coords: Coords, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat = coords.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (coords.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: f64) -> Coords {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lng = x / scale * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / scale;
    let lat = n.sinh().atan().to_degrees();
    Coords::new(lat, lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn origin_projects_to_world_center() {
        let (x, y) = project(Coords::new(0.0, 0.0), 0.0);
        assert!(close(x, 128.0));
        assert!(close(y, 128.0));
    }

    #[test]
    fn unproject_inverts_project() {
        for &(lat, lng) in &[(51.5074, -0.1278), (-33.86, 151.21), (10.0, 20.0)] {
            let (x, y) = project(Coords::new(lat, lng), 15.0);
            let back = unproject(x, y, 15.0);
            assert!((back.lat - lat).abs() < 1e-7, "{back:?}");
            assert!((back.lng - lng).abs() < 1e-7, "{back:?}");
        }
    }

    #[test]
    fn latitude_is_clamped() {
        let (_, top) = project(Coords::new(90.0, 0.0), 1.0);
        assert!(top.is_finite());
        assert!(top.abs() < 1e-6);
    }

    #[test]
    fn style_follows_kind() {
        assert_eq!(MarkerStyle::from(WorkoutType::Running).class_name(), "running-popup");
        assert_eq!(MarkerStyle::from(WorkoutType::Cycling).class_name(), "cycling-popup");
    }
}
