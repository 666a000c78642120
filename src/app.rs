use std::sync::mpsc::{self, Receiver};

use chrono::Local;

use eframe::{egui, App, CreationContext, Frame};
use egui::{Align, Align2, Color32, Key, Layout, RichText, ScrollArea, Sense, TextEdit, Ui};

use crate::cli::Settings;
use crate::controller::Controller;
use crate::event::{AppEvent, ListTarget};
use crate::map_view::MapView;
use crate::models::{Workout, WorkoutType};
use crate::storage::FileStore;

const RUNNING_COLOR: Color32 = Color32::from_rgb(0x00, 0xc4, 0x6a);
const CYCLING_COLOR: Color32 = Color32::from_rgb(0xff, 0xb5, 0x45);

pub struct WorkoutApp {
    controller: Controller<MapView, FileStore>,
    rx: Receiver<AppEvent>,
    tile_url: Option<String>,
    locating: bool,
}

impl WorkoutApp {
    pub fn new(cc: &CreationContext, settings: Settings) -> Self {
        let (tx, rx) = mpsc::channel();
        tracing::info!(dir = %settings.data_dir.display(), "using data directory");
        let controller = Controller::new(FileStore::new(settings.data_dir), settings.zoom, tx.clone());

        let ctx = cc.egui_ctx.clone();
        let locating = settings.locator.request(tx, move || ctx.request_repaint());

        WorkoutApp {
            controller,
            rx,
            tile_url: settings.tile_url,
            locating,
        }
    }

    /// Hands queued events (map clicks, geolocation) to the controller.
    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            if matches!(event, AppEvent::PositionResolved(_)) {
                self.locating = false;
            }
            self.controller.handle(event);
        }
    }

    fn show_sidebar(&mut self, ui: &mut Ui, events: &mut Vec<AppEvent>) {
        ui.style_mut().interaction.selectable_labels = false;
        ui.add_space(10.0);
        ui.label(RichText::new("🗺 Mapty").heading().size(32.0).strong());
        ui.add_space(16.0);

        if self.controller.form().visible {
            self.show_form(ui, events);
            ui.add_space(10.0);
        } else if self.controller.entries().is_empty() {
            ui.label(RichText::new("Click on the map to log a workout.").italics());
        }

        ScrollArea::vertical()
            .max_height((ui.available_height() - 48.0).max(0.0))
            .show(ui, |ui| {
                for workout in self.controller.newest_first() {
                    show_workout(ui, workout, events);
                    ui.add_space(8.0);
                }
            });

        if self.controller.delete_all_visible() {
            ui.with_layout(Layout::bottom_up(Align::Center), |ui| {
                if ui.button(RichText::new("Delete all workouts").size(16.0)).clicked() {
                    events.push(AppEvent::ResetClicked);
                }
            });
        }
    }

    fn show_form(&mut self, ui: &mut Ui, events: &mut Vec<AppEvent>) {
        let mut submit = false;
        egui::Frame::group(ui.style()).show(ui, |ui| {
            egui::Grid::new("workout_form")
                .num_columns(2)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    let form = self.controller.form_mut();

                    ui.label("Type");
                    let mut kind = form.workout_type;
                    egui::ComboBox::from_id_salt("workout_type")
                        .selected_text(kind.label())
                        .show_ui(ui, |ui| {
                            for option in WorkoutType::ALL {
                                ui.selectable_value(&mut kind, option, option.label());
                            }
                        });
                    if kind != form.workout_type {
                        events.push(AppEvent::TypeChanged(kind));
                    }
                    ui.end_row();

                    ui.label("Distance");
                    let distance = ui.add(TextEdit::singleline(&mut form.distance).hint_text("km"));
                    if form.focus_distance {
                        distance.request_focus();
                        form.focus_distance = false;
                    }
                    submit |= entered(ui, &distance);
                    ui.end_row();

                    ui.label("Duration");
                    let duration = ui.add(TextEdit::singleline(&mut form.duration).hint_text("min"));
                    submit |= entered(ui, &duration);
                    ui.end_row();

                    if form.shows_cadence() {
                        ui.label("Cadence");
                        let cadence = ui.add(TextEdit::singleline(&mut form.cadence).hint_text("step/min"));
                        submit |= entered(ui, &cadence);
                        ui.end_row();
                    }
                    if form.shows_elevation() {
                        ui.label("Elev Gain");
                        let elevation = ui.add(TextEdit::singleline(&mut form.elevation).hint_text("meters"));
                        submit |= entered(ui, &elevation);
                        ui.end_row();
                    }
                });

            ui.horizontal(|ui| {
                submit |= ui.button("OK").clicked();
                if ui.button("Cancel").clicked() {
                    events.push(AppEvent::FormCancelled);
                }
            });
        });

        if submit {
            events.push(AppEvent::FormSubmitted);
        }
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = self.controller.alert().map(str::to_owned) else {
            return;
        };
        egui::Window::new("Mapty")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(RichText::new(message).size(18.0));
                ui.add_space(8.0);
                if ui.button("OK").clicked() || ui.input(|i| i.key_pressed(Key::Enter)) {
                    self.controller.dismiss_alert();
                }
            });
    }
}

/// Enter pressed while the field had focus.
fn entered(ui: &Ui, response: &egui::Response) -> bool {
    response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter))
}

fn show_workout(ui: &mut Ui, workout: &Workout, events: &mut Vec<AppEvent>) {
    let accent = match workout.workout_type() {
        WorkoutType::Running => RUNNING_COLOR,
        WorkoutType::Cycling => CYCLING_COLOR,
    };

    egui::Frame::group(ui.style())
        .stroke(egui::Stroke::new(2.0, accent))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            let mut body_clicked = false;

            ui.horizontal(|ui| {
                let title = ui.add(
                    egui::Label::new(RichText::new(workout.description()).size(20.0).strong())
                        .sense(Sense::click()),
                );
                let logged = workout.date().with_timezone(&Local).format("%A %e %B %Y, %H:%M");
                body_clicked |= title
                    .on_hover_cursor(egui::CursorIcon::PointingHand)
                    .on_hover_text(format!("Logged {logged}"))
                    .clicked();

                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    if ui.small_button("✖").on_hover_text("Delete workout").clicked() {
                        events.push(AppEvent::ListClicked {
                            id: workout.id().to_string(),
                            target: ListTarget::Delete,
                        });
                    }
                });
            });

            let details = ui.horizontal_wrapped(|ui| {
                for row in workout.detail_rows() {
                    ui.label(row.icon);
                    ui.label(RichText::new(row.value).size(18.0).strong());
                    ui.label(RichText::new(row.unit).small());
                    ui.add_space(12.0);
                }
            });
            body_clicked |= details
                .response
                .interact(Sense::click())
                .on_hover_cursor(egui::CursorIcon::PointingHand)
                .clicked();

            if body_clicked {
                events.push(AppEvent::ListClicked {
                    id: workout.id().to_string(),
                    target: ListTarget::Body,
                });
            }
        });
}

impl App for WorkoutApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_events();

        let mut events = Vec::new();
        if self.controller.form().visible && ctx.input(|i| i.key_pressed(Key::Escape)) {
            events.push(AppEvent::FormCancelled);
        }

        egui::SidePanel::left("workouts")
            .resizable(false)
            .exact_width(440.0)
            .show(ctx, |ui| self.show_sidebar(ui, &mut events));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| match self.controller.map_mut() {
                Some(map) => {
                    map.show(ui, self.tile_url.as_deref());
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        let text = if self.locating { "Locating..." } else { "Map unavailable" };
                        ui.label(RichText::new(text).size(28.0));
                    });
                }
            });

        self.show_alert(ctx);

        for event in events {
            self.controller.handle(event);
        }
        // map clicks raised while drawing
        self.drain_events();
    }
}
