//! twinview - a small textured 3D scene viewed through two switchable cameras.
//!
//! The primary camera looks at the scene; the overview camera looks at the
//! scene and at the primary camera's frustum. `C` or the panel button flips
//! between them, the mouse orbits whichever is active.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = config::load_or_default();
    log::info!("twinview starting ({}x{})", config.window.width, config.window.height);
    log::info!("   C switches camera, ESC or close window to exit");

    if let Err(error) = app::run(config) {
        log::error!("{error}");
        std::process::exit(1);
    }
    log::info!("Goodbye!");
}
