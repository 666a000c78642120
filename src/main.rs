use anyhow::Result;
use clap::Parser;
use eframe::egui;

mod app;
mod cli;
mod controller;
mod event;
mod form;
mod geolocation;
mod map;
mod map_view;
mod models;
mod storage;
mod utils;

use app::WorkoutApp;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose, cli.quiet);
    let settings = cli.settings()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Mapty",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(WorkoutApp::new(cc, settings)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("window closed with an error: {e}"))
}
