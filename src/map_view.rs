use std::collections::BTreeMap;

use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Response, Sense, Stroke, Ui, Vec2};

use crate::map::{
    project, unproject, ClickHandler, MapWidget, MarkerHandle, MarkerStyle, MAX_ZOOM, MIN_ZOOM,
    TILE_SIZE,
};
use crate::models::Coords;

pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Seconds a `pan_to` takes.
const PAN_SECONDS: f64 = 1.0;
/// Accumulated scroll needed for one zoom step.
const SCROLL_STEP: f32 = 60.0;

const RUNNING_COLOR: Color32 = Color32::from_rgb(0x00, 0xc4, 0x6a);
const CYCLING_COLOR: Color32 = Color32::from_rgb(0xff, 0xb5, 0x45);

struct Marker {
    coords: Coords,
    popup: String,
    style: MarkerStyle,
}

struct Pan {
    from: Coords,
    to: Coords,
    started: Option<f64>,
}

/// Slippy map drawn with egui: raster tiles, markers with open popups,
/// drag to pan, scroll to zoom, click to report a position.
pub struct MapView {
    center: Coords,
    zoom: u8,
    markers: BTreeMap<MarkerHandle, Marker>,
    next_marker: u64,
    on_click: Option<ClickHandler>,
    pan: Option<Pan>,
    scroll: f32,
}

impl MapWidget for MapView {
    fn init(center: Coords, zoom: u8) -> Self {
        tracing::info!(%center, zoom, "map initialised");
        MapView {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            markers: BTreeMap::new(),
            next_marker: 0,
            on_click: None,
            pan: None,
            scroll: 0.0,
        }
    }

    fn on_click(&mut self, handler: ClickHandler) {
        self.on_click = Some(handler);
    }

    fn add_marker(&mut self, coords: Coords, popup: &str, style: MarkerStyle) -> MarkerHandle {
        self.next_marker += 1;
        let handle = MarkerHandle::new(self.next_marker);
        tracing::debug!(%coords, style = style.class_name(), "marker added");
        self.markers.insert(
            handle,
            Marker {
                coords,
                popup: popup.to_string(),
                style,
            },
        );
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        self.markers.remove(&marker);
    }

    fn pan_to(&mut self, coords: Coords, zoom: u8) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Some(Pan {
            from: self.center,
            to: coords,
            started: None,
        });
    }
}

impl MapView {
    /// Draws the map into all available space. `tile_url` is a
    /// `{z}/{x}/{y}` template; without one a plain grid is drawn.
    pub fn show(&mut self, ui: &mut Ui, tile_url: Option<&str>) -> Response {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;

        self.step_pan(ui);

        if response.dragged() {
            self.pan = None;
            let delta = response.drag_delta();
            let (x, y) = project(self.center, self.zoom as f64);
            self.center = unproject(x - delta.x as f64, y - delta.y as f64, self.zoom as f64);
        }

        if response.hovered() {
            self.scroll += ui.input(|i| i.smooth_scroll_delta.y);
            if self.scroll >= SCROLL_STEP {
                self.zoom = (self.zoom + 1).min(MAX_ZOOM);
                self.scroll = 0.0;
            } else if self.scroll <= -SCROLL_STEP {
                self.zoom = self.zoom.saturating_sub(1).max(MIN_ZOOM);
                self.scroll = 0.0;
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let coords = self.screen_to_coords(rect, pos);
                if let Some(handler) = self.on_click.as_mut() {
                    handler(coords);
                }
            }
        }

        painter.rect_filled(rect, egui::CornerRadius::ZERO, Color32::from_gray(0xd8));
        match tile_url {
            Some(template) => {
                ui.scope(|ui| {
                    ui.set_clip_rect(rect);
                    for tile in visible_tiles(self.center, self.zoom, rect.width(), rect.height()) {
                        let min = rect.center() + Vec2::new(tile.offset.0 as f32, tile.offset.1 as f32);
                        let tile_rect = Rect::from_min_size(min, Vec2::splat(TILE_SIZE as f32));
                        egui::Image::new(tile_url_for(template, self.zoom, tile.x, tile.y))
                            .paint_at(ui, tile_rect);
                    }
                });
                painter.text(
                    rect.right_bottom() - Vec2::new(6.0, 4.0),
                    Align2::RIGHT_BOTTOM,
                    OSM_ATTRIBUTION,
                    FontId::proportional(11.0),
                    Color32::from_gray(0x40),
                );
            }
            None => self.draw_grid(&painter, rect),
        }

        for marker in self.markers.values() {
            let pos = self.coords_to_screen(rect, marker.coords);
            if rect.contains(pos) {
                draw_marker(&painter, pos, marker);
            }
        }

        response
    }

    fn step_pan(&mut self, ui: &Ui) {
        let Some(pan) = self.pan.as_mut() else {
            return;
        };
        let now = ui.input(|i| i.time);
        let started = *pan.started.get_or_insert(now);
        let t = ((now - started) / PAN_SECONDS).clamp(0.0, 1.0);
        let eased = 1.0 - (1.0 - t).powi(3);

        let zoom = self.zoom as f64;
        let (fx, fy) = project(pan.from, zoom);
        let (tx, ty) = project(pan.to, zoom);
        self.center = unproject(fx + (tx - fx) * eased, fy + (ty - fy) * eased, zoom);

        if t >= 1.0 {
            self.center = pan.to;
            self.pan = None;
        } else {
            ui.ctx().request_repaint();
        }
    }

    fn coords_to_screen(&self, rect: Rect, coords: Coords) -> Pos2 {
        let zoom = self.zoom as f64;
        let (cx, cy) = project(self.center, zoom);
        let (x, y) = project(coords, zoom);
        rect.center() + Vec2::new((x - cx) as f32, (y - cy) as f32)
    }

    fn screen_to_coords(&self, rect: Rect, pos: Pos2) -> Coords {
        let zoom = self.zoom as f64;
        let (cx, cy) = project(self.center, zoom);
        let offset = pos - rect.center();
        unproject(cx + offset.x as f64, cy + offset.y as f64, zoom)
    }

    fn draw_grid(&self, painter: &egui::Painter, rect: Rect) {
        let stroke = Stroke::new(1.0, Color32::from_gray(0xb8));
        let step = grid_step(self.zoom);
        let top_left = self.screen_to_coords(rect, rect.left_top());
        let bottom_right = self.screen_to_coords(rect, rect.right_bottom());

        let mut lng = (top_left.lng / step).floor() * step;
        while lng <= bottom_right.lng {
            let x = self.coords_to_screen(rect, Coords::new(self.center.lat, lng)).x;
            painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
            lng += step;
        }
        let mut lat = (bottom_right.lat / step).floor() * step;
        while lat <= top_left.lat {
            let y = self.coords_to_screen(rect, Coords::new(lat, self.center.lng)).y;
            painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
            lat += step;
        }
    }
}

fn draw_marker(painter: &egui::Painter, pos: Pos2, marker: &Marker) {
    let accent = match marker.style {
        MarkerStyle::RunningPopup => RUNNING_COLOR,
        MarkerStyle::CyclingPopup => CYCLING_COLOR,
    };

    let head = pos - Vec2::new(0.0, 16.0);
    painter.add(egui::Shape::convex_polygon(
        vec![pos, head + Vec2::new(-7.0, 3.0), head + Vec2::new(7.0, 3.0)],
        Color32::from_rgb(0x2a, 0x7f, 0xd4),
        Stroke::NONE,
    ));
    painter.circle_filled(head, 8.0, Color32::from_rgb(0x2a, 0x7f, 0xd4));
    painter.circle_filled(head, 3.0, Color32::WHITE);

    let galley = painter.layout_no_wrap(
        marker.popup.clone(),
        FontId::proportional(14.0),
        Color32::from_gray(0xec),
    );
    let size = galley.size() + Vec2::new(20.0, 12.0);
    let popup = Rect::from_center_size(head - Vec2::new(0.0, 14.0 + size.y / 2.0), size);
    painter.rect_filled(popup, egui::CornerRadius::same(5), Color32::from_rgb(0x2d, 0x34, 0x39));
    painter.rect_filled(
        Rect::from_min_size(popup.min, Vec2::new(5.0, size.y)),
        egui::CornerRadius::same(2),
        accent,
    );
    painter.galley(popup.min + Vec2::new(12.0, 6.0), galley, Color32::WHITE);
}

/// Degrees between grid lines at a zoom level.
fn grid_step(zoom: u8) -> f64 {
    match zoom {
        0..=4 => 10.0,
        5..=7 => 1.0,
        8..=10 => 0.1,
        11..=14 => 0.01,
        _ => 0.001,
    }
}

/// A tile to draw: its address and its top-left corner relative to the
/// view center, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tile {
    x: u32,
    y: u32,
    offset: (f64, f64),
}

fn visible_tiles(center: Coords, zoom: u8, width: f32, height: f32) -> Vec<Tile> {
    let count = 1i64 << zoom;
    let (cx, cy) = project(center, zoom as f64);
    let (half_w, half_h) = (width as f64 / 2.0, height as f64 / 2.0);

    let x0 = ((cx - half_w) / TILE_SIZE).floor() as i64;
    let x1 = ((cx + half_w) / TILE_SIZE).ceil() as i64 - 1;
    let y0 = (((cy - half_h) / TILE_SIZE).floor() as i64).max(0);
    let y1 = (((cy + half_h) / TILE_SIZE).ceil() as i64 - 1).min(count - 1);

    let mut tiles = Vec::new();
    for ty in y0..=y1 {
        for tx in x0..=x1 {
            tiles.push(Tile {
                x: tx.rem_euclid(count) as u32,
                y: ty as u32,
                offset: (tx as f64 * TILE_SIZE - cx, ty as f64 * TILE_SIZE - cy),
            });
        }
    }
    tiles
}

fn tile_url_for(template: &str, zoom: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &zoom.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}
