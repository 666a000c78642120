use crate::geolocation::GeoError;
use crate::models::{Coords, WorkoutType};

/// Which part of a list entry was clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Delete,
    Body,
}

/// Everything the host can tell the controller. One event, one operation.
#[derive(Debug)]
pub enum AppEvent {
    PositionResolved(Result<Coords, GeoError>),
    MapClicked(Coords),
    TypeChanged(WorkoutType),
    FormSubmitted,
    FormCancelled,
    ListClicked { id: String, target: ListTarget },
    ResetClicked,
}
