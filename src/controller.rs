use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};

use crate::event::{AppEvent, ListTarget};
use crate::form::{FormState, WorkoutInput};
use crate::geolocation::GeoError;
use crate::map::{MapWidget, MarkerHandle, MarkerStyle};
use crate::models::{Coords, Workout, WorkoutType};
use crate::storage::{KeyValueStore, WorkoutStore};

pub const DEFAULT_ZOOM: u8 = 15;
pub const LOCATION_ALERT: &str = "Could not get your location";

/// A workout together with its marker, if the map is up.
#[derive(Debug, Clone)]
pub struct Entry {
    pub workout: Workout,
    pub marker: Option<MarkerHandle>,
}

/// Owns the workout list and mediates between map, form, list and storage.
pub struct Controller<M, S> {
    map: Option<M>,
    zoom: u8,
    pending_click: Option<Coords>,
    entries: Vec<Entry>,
    form: FormState,
    store: WorkoutStore<S>,
    events: Sender<AppEvent>,
    alert: Option<String>,
    last_created: Option<DateTime<Utc>>,
}

impl<M: MapWidget, S: KeyValueStore> Controller<M, S> {
    /// Restores persisted workouts. Markers follow once the map is loaded.
    pub fn new(store: S, zoom: u8, events: Sender<AppEvent>) -> Self {
        let mut controller = Controller {
            map: None,
            zoom,
            pending_click: None,
            entries: Vec::new(),
            form: FormState::default(),
            store: WorkoutStore::new(store),
            events,
            alert: None,
            last_created: None,
        };
        controller.restore();
        controller
    }

    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::PositionResolved(Ok(coords)) => self.load_map(coords),
            AppEvent::PositionResolved(Err(e)) => self.location_failed(e),
            AppEvent::MapClicked(coords) => self.show_form(coords),
            AppEvent::TypeChanged(kind) => self.toggle_type(kind),
            AppEvent::FormSubmitted => self.submit(),
            AppEvent::FormCancelled => self.hide_form(),
            AppEvent::ListClicked { id, target: ListTarget::Delete } => self.delete(&id),
            AppEvent::ListClicked { id, target: ListTarget::Body } => self.go_to(&id),
            AppEvent::ResetClicked => self.reset(),
        }
    }

    fn restore(&mut self) {
        self.entries = self
            .store
            .load()
            .into_iter()
            .map(|workout| Entry { workout, marker: None })
            .collect();
        tracing::info!(count = self.entries.len(), "restored workouts");
    }

    fn load_map(&mut self, coords: Coords) {
        tracing::info!(
            position = %coords,
            "https://www.google.com/maps/@{},{}",
            coords.lat,
            coords.lng
        );

        let mut map = M::init(coords, self.zoom);
        let tx = self.events.clone();
        map.on_click(Box::new(move |clicked| {
            let _ = tx.send(AppEvent::MapClicked(clicked));
        }));
        self.map = Some(map);
        self.render_markers();
    }

    fn location_failed(&mut self, error: GeoError) {
        tracing::warn!(error = %error, "no position, map unavailable");
        self.alert = Some(LOCATION_ALERT.to_string());
    }

    fn show_form(&mut self, coords: Coords) {
        tracing::debug!(%coords, "map clicked");
        self.pending_click = Some(coords);
        self.form.show();
    }

    fn hide_form(&mut self) {
        self.form.reset();
        self.pending_click = None;
    }

    fn toggle_type(&mut self, kind: WorkoutType) {
        self.form.workout_type = kind;
    }

    fn submit(&mut self) {
        let Some(coords) = self.pending_click else {
            tracing::warn!("form submitted without a map click");
            return;
        };

        let input = match self.form.parse() {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!(error = %e, "rejected form input");
                self.alert = Some(e.to_string());
                return;
            }
        };

        let date = self.next_timestamp();
        let workout = match input {
            WorkoutInput::Running { distance, duration, cadence } => {
                Workout::running(date, coords, distance, duration, cadence)
            }
            WorkoutInput::Cycling { distance, duration, elevation_gain } => {
                Workout::cycling(date, coords, distance, duration, elevation_gain)
            }
        };
        tracing::info!(
            id = workout.id(),
            kind = workout.workout_type().tag(),
            distance = workout.distance(),
            duration = workout.duration(),
            %coords,
            "workout created"
        );

        self.entries.push(Entry { workout, marker: None });
        self.render_markers();
        self.hide_form();
        self.persist();
    }

    /// Creation time, kept strictly increasing so ids stay unique.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = creation_time(Utc::now(), self.last_created);
        self.last_created = Some(now);
        now
    }

    fn delete(&mut self, id: &str) {
        let Some(index) = self.index_of(id) else {
            tracing::warn!(id, "delete requested for unknown workout");
            return;
        };

        self.clear_markers();
        let removed = self.entries.remove(index);
        self.render_markers();
        self.persist();
        tracing::info!(id = removed.workout.id(), remaining = self.entries.len(), "workout deleted");
    }

    fn go_to(&mut self, id: &str) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let coords = self.entries[index].workout.coords();
        if let Some(map) = self.map.as_mut() {
            map.pan_to(coords, self.zoom);
        }
    }

    /// Drops every workout, persisted or not, and starts over from storage.
    fn reset(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "could not clear stored workouts");
        }
        self.clear_markers();
        self.entries.clear();
        self.hide_form();
        self.restore();
        self.render_markers();
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.workout.id() == id)
    }

    /// Places a marker for every entry that lacks one.
    fn render_markers(&mut self) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        for entry in self.entries.iter_mut().filter(|e| e.marker.is_none()) {
            let workout = &entry.workout;
            entry.marker = Some(map.add_marker(
                workout.coords(),
                &workout.popup_text(),
                MarkerStyle::from(workout.workout_type()),
            ));
        }
    }

    fn clear_markers(&mut self) {
        for entry in &mut self.entries {
            if let (Some(map), Some(marker)) = (self.map.as_mut(), entry.marker.take()) {
                map.remove_marker(marker);
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(self.entries.iter().map(|e| &e.workout)) {
            tracing::warn!(error = %e, "could not save workouts");
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Most recent first, the order the list shows them in.
    pub fn newest_first(&self) -> impl Iterator<Item = &Workout> {
        self.entries.iter().rev().map(|e| &e.workout)
    }

    pub fn delete_all_visible(&self) -> bool {
        self.entries.len() >= 2
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    #[cfg(test)]
    pub fn pending_click(&self) -> Option<Coords> {
        self.pending_click
    }

    #[cfg(test)]
    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }
}

/// `now` truncated to whole milliseconds, moved one millisecond past `last`
/// when it would not be later. Ids are built from the millisecond count.
fn creation_time(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let millis = now.timestamp_millis();
    let millis = match last {
        Some(last) if millis <= last.timestamp_millis() => last.timestamp_millis() + 1,
        _ => millis,
    };
    DateTime::from_timestamp_millis(millis).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::ClickHandler;
    use crate::models::WorkoutKind;
    use crate::storage::{MemoryStore, WORKOUTS_KEY};
    use chrono::Local;
    use std::collections::BTreeMap;
    use std::sync::mpsc::{self, Receiver};

    #[derive(Default)]
    struct FakeMap {
        center: Option<(Coords, u8)>,
        next: u64,
        markers: BTreeMap<MarkerHandle, (Coords, String, MarkerStyle)>,
        removed: usize,
        click: Option<ClickHandler>,
    }

    impl FakeMap {
        fn click(&mut self, coords: Coords) {
            if let Some(handler) = self.click.as_mut() {
                handler(coords);
            }
        }
    }

    impl MapWidget for FakeMap {
        fn init(center: Coords, zoom: u8) -> Self {
            FakeMap { center: Some((center, zoom)), ..Default::default() }
        }

        fn on_click(&mut self, handler: ClickHandler) {
            self.click = Some(handler);
        }

        fn add_marker(&mut self, coords: Coords, popup: &str, style: MarkerStyle) -> MarkerHandle {
            self.next += 1;
            let handle = MarkerHandle::new(self.next);
            self.markers.insert(handle, (coords, popup.to_string(), style));
            handle
        }

        fn remove_marker(&mut self, marker: MarkerHandle) {
            if self.markers.remove(&marker).is_some() {
                self.removed += 1;
            }
        }

        fn pan_to(&mut self, coords: Coords, zoom: u8) {
            self.center = Some((coords, zoom));
        }
    }

    type TestController = Controller<FakeMap, MemoryStore>;

    fn controller_with(store: MemoryStore) -> (TestController, Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let mut c = Controller::new(store, DEFAULT_ZOOM, tx);
        c.handle(AppEvent::PositionResolved(Ok(Coords::new(10.0, 20.0))));
        (c, rx)
    }

    fn controller() -> (TestController, Receiver<AppEvent>) {
        controller_with(MemoryStore::default())
    }

    /// Clicks the map through the widget and feeds the resulting event back.
    fn click_map(c: &mut TestController, rx: &Receiver<AppEvent>, coords: Coords) {
        c.map_mut().unwrap().click(coords);
        let event = rx.try_recv().unwrap();
        c.handle(event);
    }

    fn submit_running(c: &mut TestController, rx: &Receiver<AppEvent>, d: &str, t: &str, cad: &str) {
        click_map(c, rx, Coords::new(10.0, 20.0));
        c.handle(AppEvent::TypeChanged(WorkoutType::Running));
        let form = c.form_mut();
        form.distance = d.into();
        form.duration = t.into();
        form.cadence = cad.into();
        c.handle(AppEvent::FormSubmitted);
    }

    fn submit_cycling(c: &mut TestController, rx: &Receiver<AppEvent>, d: &str, t: &str, elev: &str) {
        click_map(c, rx, Coords::new(11.0, 21.0));
        c.handle(AppEvent::TypeChanged(WorkoutType::Cycling));
        let form = c.form_mut();
        form.distance = d.into();
        form.duration = t.into();
        form.elevation = elev.into();
        c.handle(AppEvent::FormSubmitted);
    }

    fn assert_aligned(c: &TestController) {
        let map = c.map().unwrap();
        assert_eq!(map.markers.len(), c.entries().len());
        for entry in c.entries() {
            let (coords, popup, _) = &map.markers[&entry.marker.unwrap()];
            assert_eq!(*coords, entry.workout.coords());
            assert!(popup.ends_with(entry.workout.description()));
        }
    }

    #[test]
    fn map_click_opens_form_with_pending_coords() {
        let (mut c, rx) = controller();
        assert_eq!(c.map().unwrap().center, Some((Coords::new(10.0, 20.0), DEFAULT_ZOOM)));
        assert!(!c.form().visible);

        click_map(&mut c, &rx, Coords::new(1.5, 2.5));
        assert!(c.form().visible);
        assert!(c.form().focus_distance);
        assert_eq!(c.pending_click(), Some(Coords::new(1.5, 2.5)));

        // a later click supersedes the pending one
        click_map(&mut c, &rx, Coords::new(3.0, 4.0));
        assert_eq!(c.pending_click(), Some(Coords::new(3.0, 4.0)));
    }

    #[test]
    fn running_submission_creates_record_marker_and_saves() {
        let (mut c, rx) = controller();
        submit_running(&mut c, &rx, "5", "30", "180");

        assert_eq!(c.entries().len(), 1);
        let w = &c.entries()[0].workout;
        assert_eq!(w.workout_type(), WorkoutType::Running);
        assert_eq!(w.kind(), &WorkoutKind::Running { cadence: 180.0, pace: 6.0 });
        assert_eq!(w.coords(), Coords::new(10.0, 20.0));
        let local = w.date().with_timezone(&Local);
        assert!(w.description().contains(&local.format("%B").to_string()));
        assert!(w.description().contains(&local.format("%-d").to_string()));

        assert!(!c.form().visible);
        assert!(c.form().distance.is_empty());
        assert!(c.alert().is_none());
        assert_aligned(&c);

        let stored = c.store.load();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), w.id());
    }

    #[test]
    fn cycling_submission_computes_speed() {
        let (mut c, rx) = controller();
        submit_cycling(&mut c, &rx, "20", "60", "150");

        let w = &c.entries()[0].workout;
        assert_eq!(w.workout_type(), WorkoutType::Cycling);
        assert_eq!(w.kind(), &WorkoutKind::Cycling { elevation_gain: 150.0, speed: 20.0 });
        let marker = c.entries()[0].marker.unwrap();
        assert_eq!(c.map().unwrap().markers[&marker].2, MarkerStyle::CyclingPopup);
    }

    #[test]
    fn invalid_submission_alerts_and_changes_nothing() {
        let (mut c, rx) = controller();
        submit_running(&mut c, &rx, "-1", "30", "180");

        assert!(c.entries().is_empty());
        assert_eq!(c.alert(), Some("Enter valid data"));
        assert!(c.form().visible, "form stays open for correction");
        assert_eq!(c.form().distance, "-1");
        assert!(c.map().unwrap().markers.is_empty());
        assert!(c.store.inner().get(WORKOUTS_KEY).unwrap().is_none());

        c.dismiss_alert();
        assert!(c.alert().is_none());
    }

    #[test]
    fn ids_are_unique_for_rapid_submissions() {
        let (mut c, rx) = controller();
        for _ in 0..5 {
            submit_running(&mut c, &rx, "5", "30", "180");
        }
        let mut ids: Vec<&str> = c.entries().iter().map(|e| e.workout.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn creation_time_moves_past_same_millisecond() {
        let last = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let same_ms = last + chrono::Duration::microseconds(400);

        let next = creation_time(same_ms, Some(last));
        assert_eq!(next.timestamp_millis(), 1_700_000_000_124);
        assert_eq!(next.timestamp_subsec_micros() % 1000, 0);

        let earlier = last - chrono::Duration::seconds(2);
        assert_eq!(creation_time(earlier, Some(next)).timestamp_millis(), 1_700_000_000_125);

        let later = last + chrono::Duration::seconds(1);
        assert_eq!(creation_time(later, Some(last)).timestamp_millis(), 1_700_000_001_123);
        assert_eq!(creation_time(same_ms, None).timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn delete_removes_one_entry_and_its_marker() {
        let (mut c, rx) = controller();
        submit_running(&mut c, &rx, "5", "30", "180");
        submit_cycling(&mut c, &rx, "20", "60", "150");
        submit_running(&mut c, &rx, "10", "50", "170");

        let victim = c.entries()[1].workout.clone();
        let before = c.entries().len();
        c.handle(AppEvent::ListClicked { id: victim.id().to_string(), target: ListTarget::Delete });

        assert_eq!(c.entries().len(), before - 1);
        assert!(c.entries().iter().all(|e| e.workout.id() != victim.id()));
        assert_aligned(&c);
        assert_eq!(c.store.load().len(), before - 1);
    }

    #[test]
    fn delete_unknown_id_is_ignored() {
        let (mut c, rx) = controller();
        submit_running(&mut c, &rx, "5", "30", "180");
        c.handle(AppEvent::ListClicked { id: "nope".into(), target: ListTarget::Delete });
        assert_eq!(c.entries().len(), 1);
        assert_aligned(&c);
    }

    #[test]
    fn body_click_pans_to_workout() {
        let (mut c, rx) = controller();
        submit_cycling(&mut c, &rx, "20", "60", "150");
        c.map_mut().unwrap().pan_to(Coords::new(0.0, 0.0), 3);

        let id = c.entries()[0].workout.id().to_string();
        c.handle(AppEvent::ListClicked { id, target: ListTarget::Body });
        assert_eq!(c.map().unwrap().center, Some((Coords::new(11.0, 21.0), DEFAULT_ZOOM)));
        assert_eq!(c.entries().len(), 1);
    }

    #[test]
    fn delete_all_shown_only_from_two_items() {
        let (mut c, rx) = controller();
        assert!(!c.delete_all_visible());
        submit_running(&mut c, &rx, "5", "30", "180");
        assert!(!c.delete_all_visible());
        submit_running(&mut c, &rx, "6", "30", "180");
        assert!(c.delete_all_visible());

        let id = c.entries()[0].workout.id().to_string();
        c.handle(AppEvent::ListClicked { id, target: ListTarget::Delete });
        assert!(!c.delete_all_visible());
    }

    #[test]
    fn reset_clears_storage_and_state() {
        let (mut c, rx) = controller();
        for d in ["5", "6", "7"] {
            submit_running(&mut c, &rx, d, "30", "180");
        }
        assert_eq!(c.entries().len(), 3);

        c.handle(AppEvent::ResetClicked);
        assert!(c.entries().is_empty());
        assert!(c.store.inner().get(WORKOUTS_KEY).unwrap().is_none());
        assert!(c.map().unwrap().markers.is_empty());
        assert!(!c.delete_all_visible());
    }

    #[test]
    fn restores_and_renders_persisted_workouts_newest_first() {
        let (mut c, rx) = controller();
        submit_running(&mut c, &rx, "5", "30", "180");
        submit_cycling(&mut c, &rx, "20", "60", "150");
        let json = c.store.inner().get(WORKOUTS_KEY).unwrap().unwrap();

        let mut store = MemoryStore::default();
        store.set(WORKOUTS_KEY, &json).unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut restored: TestController = Controller::new(store, DEFAULT_ZOOM, tx);

        assert_eq!(restored.entries().len(), 2);
        assert!(restored.entries().iter().all(|e| e.marker.is_none()));
        let order: Vec<WorkoutType> = restored.newest_first().map(Workout::workout_type).collect();
        assert_eq!(order, vec![WorkoutType::Cycling, WorkoutType::Running]);

        restored.handle(AppEvent::PositionResolved(Ok(Coords::new(0.0, 0.0))));
        assert_aligned(&restored);
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let mut store = MemoryStore::default();
        store.set(WORKOUTS_KEY, "[{\"id\": 3").unwrap();
        let (c, _rx) = controller_with(store);
        assert!(c.entries().is_empty());
        assert!(c.alert().is_none());
    }

    #[test]
    fn location_failure_alerts_without_map() {
        let (tx, _rx) = mpsc::channel();
        let mut c: TestController = Controller::new(MemoryStore::default(), DEFAULT_ZOOM, tx);
        c.handle(AppEvent::PositionResolved(Err(GeoError::MissingCoordinates)));
        assert_eq!(c.alert(), Some(LOCATION_ALERT));
        assert!(c.map().is_none());
    }

    #[test]
    fn missing_location_source_alerts() {
        let (tx, rx) = mpsc::channel();
        let mut c: TestController = Controller::new(MemoryStore::default(), DEFAULT_ZOOM, tx.clone());
        assert!(!crate::geolocation::Locator::Disabled.request(tx, || {}));
        c.handle(rx.try_recv().unwrap());
        assert_eq!(c.alert(), Some(LOCATION_ALERT));
        assert!(c.map().is_none());
    }

    #[test]
    fn cancel_discards_pending_click() {
        let (mut c, rx) = controller();
        click_map(&mut c, &rx, Coords::new(1.0, 1.0));
        c.form_mut().distance = "3".into();
        c.handle(AppEvent::FormCancelled);
        assert!(!c.form().visible);
        assert!(c.pending_click().is_none());
        assert!(c.form().distance.is_empty());
    }
}
