use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::event::AppEvent;
use crate::models::Coords;

pub const DEFAULT_GEO_URL: &str = "http://ip-api.com/json";

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("location request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("location service sent invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("location service answered without coordinates")]
    MissingCoordinates,

    #[error("no location source available")]
    Unavailable,
}

/// Where the current position comes from.
#[derive(Debug, Clone)]
pub enum Locator {
    /// No position source at all. Resolves at once as unavailable and the map
    /// stays off.
    Disabled,
    Fixed(Coords),
    Ip { url: String },
}

impl Locator {
    /// Requests the position in the background. The outcome arrives once as
    /// `AppEvent::PositionResolved`, after which `notify` is called.
    ///
    /// Returns false when there is no position source; the failure is still
    /// delivered as an event.
    pub fn request<F>(&self, tx: Sender<AppEvent>, notify: F) -> bool
    where
        F: Fn() + Send + 'static,
    {
        match self {
            Locator::Disabled => {
                tracing::info!("geolocation disabled");
                let _ = tx.send(AppEvent::PositionResolved(Err(GeoError::Unavailable)));
                notify();
                false
            }
            Locator::Fixed(coords) => {
                let _ = tx.send(AppEvent::PositionResolved(Ok(*coords)));
                notify();
                true
            }
            Locator::Ip { url } => {
                let url = url.clone();
                thread::spawn(move || {
                    let result = fetch_position(&url);
                    if let Err(e) = &result {
                        tracing::warn!(error = %e, %url, "geolocation failed");
                    }
                    let _ = tx.send(AppEvent::PositionResolved(result));
                    notify();
                });
                true
            }
        }
    }
}

fn fetch_position(url: &str) -> Result<Coords, GeoError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let body = client.get(url).send()?.error_for_status()?.text()?;
    position_from_body(&body)
}

fn position_from_body(body: &str) -> Result<Coords, GeoError> {
    let body: Value = serde_json::from_str(body)?;
    parse_position(&body)
}

/// Accepts `{lat, lon}` (ip-api style) or `{latitude, longitude}`.
pub fn parse_position(body: &Value) -> Result<Coords, GeoError> {
    let pick = |a: &str, b: &str| body.get(a).or_else(|| body.get(b)).and_then(Value::as_f64);

    match (pick("lat", "latitude"), pick("lon", "longitude")) {
        (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Ok(Coords::new(lat, lng)),
        _ => Err(GeoError::MissingCoordinates),
    }
}
