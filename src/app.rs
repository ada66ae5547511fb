use crate::application::{DownloadCoordinator, RunEvent};
use crate::config::AppConfig;
use crate::domain::{AppError, DownloadRequest, RunPhase, RunSummary};
use crate::downloader::{DownloaderConfig, SpotdlClient};
use crate::launcher::{self, SpotifyTarget};
use crate::library::AppleMusicImporter;
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::validate_spotify_url;
use futures::StreamExt;
use iced::Task;
use rfd::{AsyncMessageDialog, MessageButtons, MessageLevel};

type Coordinator = DownloadCoordinator<SpotdlClient, AppleMusicImporter>;

/// Initial value shown as soon as a run is accepted.
const SUBMITTED_PROGRESS: f32 = 5.0;

pub struct DownloadApp {
    view: DownloadView,
    coordinator: Coordinator,
    config: AppConfig,
    phase: RunPhase,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(AppConfig::load())
    }
}

impl DownloadApp {
    pub fn new(config: AppConfig) -> Self {
        let client = SpotdlClient::new(DownloaderConfig::from_app_config(&config));
        let missing = client.check_dependencies();

        let importer = match AppleMusicImporter::new(&config) {
            Ok(importer) => Some(importer),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        };
        let coordinator = DownloadCoordinator::new(client, importer);

        let mut view = DownloadView {
            import_to_library: coordinator.can_import(),
            ..DownloadView::default()
        };
        for tool in missing {
            tracing::warn!("{} was not found", tool);
            view.push_log(format!("Warning: {} was not found", tool));
        }

        Self {
            view,
            coordinator,
            config,
            phase: RunPhase::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Update from the background run
    Run(RunEvent),
    SpotifyOpened(Result<SpotifyTarget, String>),
    DialogClosed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => return start_run(app),
                DownloadMessage::OpenSpotifyPressed => {
                    return Task::perform(launcher::open_spotify(), Message::SpotifyOpened);
                }
                _ => {}
            }
        }
        Message::Run(event) => return apply_run_event(app, event),
        Message::SpotifyOpened(result) => match result {
            Ok(target) => {
                app.view.push_log(target.describe());
                app.view.status_message = target.describe().to_string();
            }
            Err(e) => {
                app.view.push_log(e.clone());
                return notify(MessageLevel::Error, "Error", e);
            }
        },
        Message::DialogClosed => {}
    }
    Task::none()
}

/// A busy app refuses any submission before the URL is even looked at.
fn accept_submission(phase: &mut RunPhase, url: &str) -> Result<String, AppError> {
    phase.ensure_idle()?;
    let url = validate_spotify_url(url)?;
    phase.begin()?;
    Ok(url)
}

fn start_run(app: &mut DownloadApp) -> Task<Message> {
    let url = match accept_submission(&mut app.phase, &app.view.url) {
        Ok(url) => url,
        Err(e @ AppError::RunInProgress) => {
            return notify(MessageLevel::Warning, "In Progress", e.to_string());
        }
        Err(e) => return notify(MessageLevel::Error, "Error", e.to_string()),
    };

    app.view.clear_log();
    app.view.progress = SUBMITTED_PROGRESS;
    app.view.is_downloading = true;

    let request = DownloadRequest {
        url,
        output_dir: app.config.output_dir.clone(),
        overwrite: app.view.overwrite_existing,
    };
    run_in_background(app.coordinator.clone(), request, app.view.import_to_library)
}

/// Runs the coordinator on the executor and feeds its events back into `update`.
fn run_in_background(
    coordinator: Coordinator,
    request: DownloadRequest,
    import: bool,
) -> Task<Message> {
    let (sender, receiver) = futures::channel::mpsc::unbounded();

    let worker = async move {
        let emit = |event: RunEvent| {
            // The receiver only goes away when the window closes.
            let _ = sender.unbounded_send(event);
        };
        let result = coordinator.run(request, import, &emit).await;
        emit(RunEvent::Finished(result));
    };

    Task::stream(futures::stream::select(
        receiver.map(Message::Run),
        futures::stream::once(worker).filter_map(|()| futures::future::ready(None)),
    ))
}

fn apply_run_event(app: &mut DownloadApp, event: RunEvent) -> Task<Message> {
    match event {
        RunEvent::Phase(phase) => {
            if !app.phase.advance(phase) {
                tracing::debug!("Ignoring phase change {:?} -> {:?}", app.phase, phase);
            }
        }
        RunEvent::Status(status) => app.view.status_message = status,
        RunEvent::Log(line) => app.view.push_log(line),
        RunEvent::Progress(progress) => app.view.progress = progress,
        RunEvent::Finished(result) => return finish_run(app, result),
    }
    Task::none()
}

fn finish_run(app: &mut DownloadApp, result: Result<RunSummary, AppError>) -> Task<Message> {
    app.view.is_downloading = false;

    match result {
        Ok(summary) => {
            app.phase.advance(RunPhase::Completed);
            match &summary.imported {
                Some(report) => tracing::info!(
                    "Run complete: {} downloaded, {}/{} imported",
                    summary.downloaded.len(),
                    report.succeeded_count(),
                    report.attempted()
                ),
                None => tracing::info!("Run complete: {} downloaded", summary.downloaded.len()),
            }
            app.view.progress = 100.0;
            app.view.status_message = "Complete!".to_string();
            app.view.url.clear();
            notify(
                MessageLevel::Info,
                "Success",
                format!(
                    "Successfully processed {} song(s)!",
                    summary.downloaded.len()
                ),
            )
        }
        Err(e) => {
            app.phase.advance(RunPhase::Failed);
            tracing::warn!("Run failed: {}", e);
            app.view.push_log(format!("Error: {}", e));
            app.view.status_message = "Error!".to_string();
            notify(
                MessageLevel::Error,
                "Error",
                format!("An error occurred: {}", e),
            )
        }
    }
}

fn notify(level: MessageLevel, title: &'static str, description: String) -> Task<Message> {
    Task::perform(
        async move {
            AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .set_buttons(MessageButtons::Ok)
                .show()
                .await;
        },
        |()| Message::DialogClosed,
    )
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
