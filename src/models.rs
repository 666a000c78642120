//models.rs
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position, stored as a `[lat, lng]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for Coords {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coords> for [f64; 2] {
    fn from(c: Coords) -> Self {
        [c.lat, c.lng]
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum WorkoutType {
    #[default]
    Running,
    Cycling,
}

impl WorkoutType {
    pub const ALL: [WorkoutType; 2] = [WorkoutType::Running, WorkoutType::Cycling];

    pub fn tag(self) -> &'static str {
        match self {
            WorkoutType::Running => "running",
            WorkoutType::Cycling => "cycling",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkoutType::Running => "Running",
            WorkoutType::Cycling => "Cycling",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            WorkoutType::Running => "🏃",
            WorkoutType::Cycling => "🚴",
        }
    }
}

/// Kind-specific inputs and the one metric derived from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkoutKind {
    Running {
        cadence: f64,
        /// min/km
        pace: f64,
    },
    Cycling {
        #[serde(rename = "elevationGain")]
        elevation_gain: f64,
        /// km/h
        speed: f64,
    },
}

impl WorkoutKind {
    pub fn workout_type(&self) -> WorkoutType {
        match self {
            WorkoutKind::Running { .. } => WorkoutType::Running,
            WorkoutKind::Cycling { .. } => WorkoutType::Cycling,
        }
    }
}

/// A recorded workout. Fields are fixed at construction; there is no way to
/// edit a workout afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    id: String,
    date: DateTime<Utc>,
    coords: Coords,
    distance: f64,
    duration: f64,
    description: String,
    #[serde(flatten)]
    kind: WorkoutKind,
}

impl Workout {
    pub fn running(
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        cadence: f64,
    ) -> Self {
        let pace = duration / distance;
        Self::build(date, coords, distance, duration, WorkoutKind::Running { cadence, pace })
    }

    pub fn cycling(
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        elevation_gain: f64,
    ) -> Self {
        let speed = distance / (duration / 60.0);
        Self::build(
            date,
            coords,
            distance,
            duration,
            WorkoutKind::Cycling { elevation_gain, speed },
        )
    }

    fn build(
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        kind: WorkoutKind,
    ) -> Self {
        Workout {
            id: id_from_date(date),
            description: describe(kind.workout_type(), date),
            date,
            coords,
            distance,
            duration,
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn coords(&self) -> Coords {
        self.coords
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &WorkoutKind {
        &self.kind
    }

    pub fn workout_type(&self) -> WorkoutType {
        self.kind.workout_type()
    }

    /// Text shown in the marker popup.
    pub fn popup_text(&self) -> String {
        format!("{} {}", self.workout_type().icon(), self.description)
    }

    /// Rows shown in the workout list: distance, duration, then the two
    /// kind-specific values. Only pace and speed are rounded.
    pub fn detail_rows(&self) -> [DetailRow; 4] {
        let mut rows = [
            DetailRow::new(self.workout_type().icon(), self.distance.to_string(), "km"),
            DetailRow::new("⏱", self.duration.to_string(), "min"),
            DetailRow::default(),
            DetailRow::default(),
        ];
        match self.kind {
            WorkoutKind::Running { cadence, pace } => {
                rows[2] = DetailRow::new("⚡", one_decimal(pace), "min/km");
                rows[3] = DetailRow::new("🦶", cadence.to_string(), "spm");
            }
            WorkoutKind::Cycling { elevation_gain, speed } => {
                rows[2] = DetailRow::new("⚡", one_decimal(speed), "km/h");
                rows[3] = DetailRow::new("⛰", elevation_gain.to_string(), "m");
            }
        }
        rows
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetailRow {
    pub icon: &'static str,
    pub value: String,
    pub unit: &'static str,
}

impl DetailRow {
    fn new(icon: &'static str, value: String, unit: &'static str) -> Self {
        Self { icon, value, unit }
    }
}

/// One decimal place, ties rounded away from zero.
fn one_decimal(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round() / 10.0)
}

/// Last ten digits of the creation time in milliseconds.
fn id_from_date(date: DateTime<Utc>) -> String {
    let millis = date.timestamp_millis().to_string();
    let start = millis.len().saturating_sub(10);
    millis[start..].to_string()
}

/// e.g. "Running on October 19", in local time.
fn describe(kind: WorkoutType, date: DateTime<Utc>) -> String {
    let local = date.with_timezone(&Local);
    format!("{} on {}", kind.label(), local.format("%B %-d"))
}
