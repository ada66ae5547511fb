use iced::{
    widget::{button, column, progress_bar, row, scrollable, text, text_input, toggler, Space},
    Element, Font, Length,
};

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub status_message: String,
    pub is_downloading: bool,
    /// 0 to 100
    pub progress: f32,
    pub import_to_library: bool,
    pub overwrite_existing: bool,
    pub logs_visible: bool,
    pub log_lines: Vec<String>,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            status_message: "Ready".to_string(),
            is_downloading: false,
            progress: 0.0,
            import_to_library: true,
            overwrite_existing: false,
            logs_visible: false,
            log_lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    DownloadPressed,
    OpenSpotifyPressed,
    ImportToggled(bool),
    OverwriteToggled(bool),
    ToggleLogs,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::ImportToggled(enabled) => {
                self.import_to_library = enabled;
            }
            DownloadMessage::OverwriteToggled(enabled) => {
                self.overwrite_existing = enabled;
            }
            DownloadMessage::ToggleLogs => {
                self.logs_visible = !self.logs_visible;
            }
            DownloadMessage::DownloadPressed | DownloadMessage::OpenSpotifyPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log_lines.push(line.into());
    }

    pub fn clear_log(&mut self) {
        self.log_lines.clear();
    }

    /// Editing and submitting are both off while a run is active.
    fn url_edit(&self) -> Option<fn(String) -> DownloadMessage> {
        let on_input: fn(String) -> DownloadMessage = DownloadMessage::UrlChanged;
        (!self.is_downloading).then_some(on_input)
    }

    fn submit(&self) -> Option<DownloadMessage> {
        (!self.is_downloading).then_some(DownloadMessage::DownloadPressed)
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let download_button = button("Download")
            .on_press_maybe(self.submit())
            .padding([10, 20]);

        let mut content = column![
            text("Spotify to Apple Music Downloader").size(28),
            Space::new().height(Length::Fixed(10.0)),
            text("Spotify URL:").size(16),
            row![
                text_input("Paste a song, album or playlist link...", &self.url)
                    .on_input_maybe(self.url_edit())
                    .on_submit_maybe(self.submit())
                    .padding(10)
                    .width(Length::Fill),
                button("Open Spotify")
                    .on_press(DownloadMessage::OpenSpotifyPressed)
                    .padding([10, 20]),
                download_button,
            ]
            .spacing(10),
            Space::new().height(Length::Fixed(10.0)),
            toggler(self.import_to_library)
                .label("Import to Apple Music after download")
                .on_toggle(DownloadMessage::ImportToggled),
            toggler(self.overwrite_existing)
                .label("Re-download if file already exists")
                .on_toggle(DownloadMessage::OverwriteToggled),
            Space::new().height(Length::Fixed(10.0)),
            progress_bar(0.0..=100.0, self.progress),
            button(if self.logs_visible {
                "Hide Logs"
            } else {
                "Show Logs"
            })
            .on_press(DownloadMessage::ToggleLogs)
            .padding([5, 10]),
        ]
        .padding(20)
        .spacing(10);

        if self.logs_visible {
            content = content.push(self.log_panel());
        }

        content.push(text(&self.status_message).size(14)).into()
    }

    fn log_panel(&self) -> Element<'_, DownloadMessage> {
        let lines = column(self.log_lines.iter().map(|line| log_line(line))).spacing(2);

        scrollable(lines)
            .anchor_bottom()
            .height(Length::Fixed(240.0))
            .width(Length::Fill)
            .into()
    }
}

fn log_line(line: &str) -> Element<'_, DownloadMessage> {
    text(line).size(12).font(Font::MONOSPACE).into()
}
