use crate::models::WorkoutType;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("Enter valid data")]
    InvalidInput,
}

/// Validated values read from the form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkoutInput {
    Running {
        distance: f64,
        duration: f64,
        cadence: f64,
    },
    Cycling {
        distance: f64,
        duration: f64,
        elevation_gain: f64,
    },
}

/// Raw contents of the new-workout form.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub workout_type: WorkoutType,
    pub distance: String,
    pub duration: String,
    pub cadence: String,
    pub elevation: String,
    pub visible: bool,
    /// Set when the form opens; the UI gives the distance field focus once.
    pub focus_distance: bool,
}

impl FormState {
    pub fn show(&mut self) {
        self.visible = true;
        self.focus_distance = true;
    }

    /// Clears every input and hides the form. The selected type is kept.
    pub fn reset(&mut self) {
        self.distance.clear();
        self.duration.clear();
        self.cadence.clear();
        self.elevation.clear();
        self.visible = false;
        self.focus_distance = false;
    }

    pub fn shows_cadence(&self) -> bool {
        self.workout_type == WorkoutType::Running
    }

    pub fn shows_elevation(&self) -> bool {
        self.workout_type == WorkoutType::Cycling
    }

    pub fn parse(&self) -> Result<WorkoutInput, FormError> {
        let distance = number(&self.distance);
        let duration = number(&self.duration);

        match self.workout_type {
            WorkoutType::Running => {
                let cadence = number(&self.cadence);
                if !all_finite(&[distance, duration, cadence])
                    || !all_positive(&[distance, duration, cadence])
                {
                    return Err(FormError::InvalidInput);
                }
                Ok(WorkoutInput::Running { distance, duration, cadence })
            }
            WorkoutType::Cycling => {
                let elevation_gain = number(&self.elevation);
                // elevation may be zero or negative
                if !all_finite(&[distance, duration, elevation_gain])
                    || !all_positive(&[distance, duration])
                {
                    return Err(FormError::InvalidInput);
                }
                Ok(WorkoutInput::Cycling { distance, duration, elevation_gain })
            }
        }
    }
}

/// Empty text reads as 0; anything unparsable reads as NaN.
fn number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn all_positive(values: &[f64]) -> bool {
    values.iter().all(|v| *v > 0.0)
}
