use std::process::ExitCode;

use eframe::egui;
use greenlens::app::GreenLensApp;
use greenlens::config::Settings;
use greenlens::data::cache::TableCache;
use greenlens::state::AppState;

fn main() -> ExitCode {
    env_logger::init();

    let settings = match Settings::from_env_args(std::env::args()) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Invalid settings: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // The dashboard needs data before the first frame; fail fast otherwise.
    let table = match TableCache::global().get_or_load(&settings.data_path) {
        Ok(table) => table,
        Err(e) => {
            log::error!("Failed to load dataset: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("GreenLens ESG Analytics")
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    let state = AppState::new(settings, table);
    let result = eframe::run_native(
        "GreenLens ESG Analytics",
        options,
        Box::new(|_cc| Ok(Box::new(GreenLensApp::new(state)))),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("UI error: {e}");
            ExitCode::FAILURE
        }
    }
}
