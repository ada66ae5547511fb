mod app;
mod application;
mod config;
mod domain;
mod downloader;
mod launcher;
mod library;
mod ui;
mod utils;

use iced::window;
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(e) => {
            tracing::warn!("Could not load window icon: {}", e);
            None
        }
    };

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("Spotify to Apple Music Downloader")
        .window(window::Settings {
            icon,
            size: iced::Size::new(700.0, 520.0),
            ..Default::default()
        })
        .run()
}
