use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use client_core::Settings;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::validate_username;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{HostEvent, UiError, UiErrorContext, UiEvent};
use crate::controller::orchestration::{apply_effects, dispatch_backend_command};
use crate::controller::view::{Background, ViewEffect, ViewState};

const HEADER_MARGIN_TOP: f32 = 6.0;
const HEADER_MARGIN_BOTTOM: f32 = 8.0;
const HEADER_MAX_WIDTH: f32 = 260.0;
const MASCOT_MAX_SIDE: u32 = 160;
const ALERT_FILL: egui::Color32 = egui::Color32::from_rgb(0xd9, 0x3b, 0x3b);
const IDLE_REPAINT: Duration = Duration::from_millis(250);
const SUBMIT_SCOPE_ID: &str = "nudge_submit";

pub struct StartupConfig {
    pub settings: Settings,
    pub settings_path: Option<PathBuf>,
    pub image: Option<String>,
    pub compose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Setup,
    Widget,
}

struct Mascot {
    source: String,
    texture: Option<egui::TextureHandle>,
}

pub struct WidgetApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    view: ViewState,
    screen: Screen,
    settings: Settings,
    settings_path: Option<PathBuf>,
    setup_username: String,
    setup_server: String,
    status: String,
    pending_effects: Vec<ViewEffect>,
    mascot: Option<Mascot>,
    quitting: bool,
    worker: Option<thread::JoinHandle<()>>,
}

impl WidgetApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        startup: StartupConfig,
    ) -> Self {
        let mut view = ViewState::default();
        view.set_image(startup.image);

        let mut app = Self {
            cmd_tx,
            ui_rx,
            view,
            screen: Screen::Setup,
            setup_username: startup.settings.username.clone(),
            setup_server: startup.settings.server.clone(),
            settings: startup.settings,
            settings_path: startup.settings_path,
            status: String::new(),
            pending_effects: Vec::new(),
            mascot: None,
            quitting: false,
            worker: None,
        };

        if app.settings.is_complete() {
            app.screen = Screen::Widget;
            dispatch_backend_command(
                &app.cmd_tx,
                BackendCommand::Connect(app.settings.clone()),
                &mut app.status,
            );
        }
        if startup.compose {
            app.handle_host_event(HostEvent::Send, Instant::now());
        }
        app
    }

    /// Backend worker to shut down and join when the app goes away.
    pub fn with_worker(mut self, worker: thread::JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }

    fn process_ui_events(&mut self, now: Instant) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Host(event) => self.handle_host_event(event, now),
                UiEvent::Connected { identity } => {
                    self.status = format!("Connected as {identity}");
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), "{}", err.message());
                    self.status = err.status_line();
                }
            }
        }
    }

    fn handle_host_event(&mut self, event: HostEvent, now: Instant) {
        let effects = match event {
            HostEvent::ChatMessage { from, text } => self.view.on_chat_message(from, text, now),
            HostEvent::Send => self.view.on_send(),
            HostEvent::OnlineUsers(users) => {
                self.view.on_online_users(users);
                Vec::new()
            }
        };
        self.pending_effects.extend(effects);
    }

    /// Picks `user` as the receiver and opens the compose panel.
    fn compose_to(&mut self, user: &str) {
        self.view.select_user(user);
        self.handle_host_event(HostEvent::Send, Instant::now());
    }

    fn quit(&mut self, ctx: &egui::Context) {
        self.quitting = true;
        dispatch_backend_command(&self.cmd_tx, BackendCommand::Shutdown, &mut self.status);
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn save_setup(&mut self) {
        let settings = Settings::new(self.setup_username.trim(), self.setup_server.trim());
        if !settings.is_complete() {
            self.status = UiError::from_message(
                UiErrorContext::Settings,
                "username and server are both required",
            )
            .status_line();
            return;
        }
        if let Err(err) = validate_username(&settings.username) {
            self.status =
                UiError::from_message(UiErrorContext::Settings, err.to_string()).status_line();
            return;
        }

        let saved = match &self.settings_path {
            Some(path) => settings.save_to_file(path).map(|()| path.clone()),
            None => settings.save_to_system_path(),
        };
        match saved {
            Ok(path) => tracing::info!(path = %path.display(), "saved widget settings"),
            Err(err) => {
                tracing::warn!("failed to save settings: {err}");
                self.status =
                    UiError::from_message(UiErrorContext::Settings, err.to_string()).status_line();
            }
        }

        self.settings = settings;
        self.screen = Screen::Widget;
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::Connect(self.settings.clone()),
            &mut self.status,
        );
    }

    fn show_setup_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(
                egui::Frame::NONE
                    .fill(ctx.style().visuals.panel_fill)
                    .corner_radius(12.0)
                    .inner_margin(egui::Margin::symmetric(14, 12)),
            )
            .show(ctx, |ui| {
                ui.style_mut().spacing.item_spacing = egui::vec2(8.0, 8.0);
                ui.heading("Nudge");
                ui.weak("Pick a name and the relay to connect to.");

                ui.label("Username");
                ui.add(
                    egui::TextEdit::singleline(&mut self.setup_username)
                        .hint_text("alice")
                        .desired_width(f32::INFINITY),
                );
                ui.label("Server");
                let server = ui.add(
                    egui::TextEdit::singleline(&mut self.setup_server)
                        .hint_text("127.0.0.1:8443")
                        .desired_width(f32::INFINITY),
                );
                let enter = server.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.horizontal(|ui| {
                    if ui.button("Save & connect").clicked() || enter {
                        self.save_setup();
                    }
                    if self.settings.is_complete() && ui.button("Cancel").clicked() {
                        self.screen = Screen::Widget;
                    }
                });

                if !self.status.is_empty() {
                    ui.small(&self.status);
                }
            });
    }

    fn show_widget(&mut self, ctx: &egui::Context) {
        let (background, top_padding, show_chat) = {
            let model = self.view.project();
            (model.background, model.top_padding, model.show_chat)
        };

        let header = self.show_header(ctx);
        let measured = header.response.rect.height();
        if self
            .view
            .on_layout_measured(measured, HEADER_MARGIN_TOP, HEADER_MARGIN_BOTTOM)
        {
            tracing::debug!(header_height = measured, "measured header layout");
        }
        header.response.context_menu(|ui| self.control_menu(ui));

        let fill = match background {
            Background::Alert => ALERT_FILL,
            Background::Transparent => egui::Color32::TRANSPARENT,
        };
        let panel = egui::CentralPanel::default()
            .frame(
                egui::Frame::NONE
                    .fill(fill)
                    .corner_radius(12.0)
                    .inner_margin(egui::Margin::symmetric(10, 0)),
            )
            .show(ctx, |ui| {
                // Registered before the panel's widgets so they stay on top for clicks.
                let background = ui.interact(
                    ui.max_rect(),
                    ui.id().with("widget_background"),
                    egui::Sense::click(),
                );
                ui.add_space(top_padding);
                if show_chat {
                    self.show_chat_panel(ui);
                } else {
                    self.show_prompt_panel(ui);
                }
                if !self.status.is_empty() {
                    ui.with_layout(egui::Layout::bottom_up(egui::Align::Center), |ui| {
                        ui.small(&self.status);
                    });
                }
                background
            });
        panel.inner.context_menu(|ui| self.control_menu(ui));
    }

    fn show_header(&self, ctx: &egui::Context) -> egui::InnerResponse<()> {
        let model = self.view.project();
        egui::Area::new(egui::Id::new("nudge_header"))
            .order(egui::Order::Foreground)
            .sense(egui::Sense::click())
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, HEADER_MARGIN_TOP))
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(ctx.style().visuals.extreme_bg_color)
                    .stroke(egui::Stroke::new(
                        1.0,
                        ctx.style().visuals.widgets.noninteractive.bg_stroke.color,
                    ))
                    .corner_radius(10.0)
                    .inner_margin(egui::Margin::symmetric(12, 8))
                    .show(ui, |ui| {
                        ui.set_max_width(HEADER_MAX_WIDTH);
                        if let Some(sender) = model.message_sender {
                            ui.label(egui::RichText::new(sender).strong().small());
                        }
                        ui.label(egui::RichText::new(model.message_text).size(15.0));
                    });
            })
    }

    fn show_prompt_panel(&mut self, ui: &mut egui::Ui) {
        let source = self.view.project().image_url.map(str::to_owned);
        ui.vertical_centered(|ui| match source {
            Some(source) => match self.mascot_texture(ui.ctx(), &source) {
                Some(texture) => {
                    ui.add(egui::Image::new(&texture).max_size(egui::vec2(
                        MASCOT_MAX_SIDE as f32,
                        MASCOT_MAX_SIDE as f32,
                    )));
                }
                None => {
                    ui.weak("(image unavailable)");
                }
            },
            None => {
                ui.label(egui::RichText::new("( o_o )").size(40.0));
            }
        });
    }

    fn show_chat_panel(&mut self, ui: &mut egui::Ui) {
        let (users, selected) = {
            let model = self.view.project();
            (
                model.online_users.to_vec(),
                model.selected_user.map(str::to_owned),
            )
        };

        let mut choice = None;
        ui.horizontal(|ui| {
            ui.label("To");
            egui::ComboBox::from_id_salt("nudge_receiver")
                .selected_text(selected.as_deref().unwrap_or("nobody online"))
                .width(ui.available_width())
                .show_ui(ui, |ui| {
                    for user in &users {
                        let is_selected = selected.as_deref() == Some(user.as_str());
                        if ui.selectable_label(is_selected, user).clicked() {
                            choice = Some(user.clone());
                        }
                    }
                });
        });
        if let Some(user) = choice {
            self.view.select_user(&user);
        }

        let ctrl_enter =
            ui.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Enter));
        ui.add(
            egui::TextEdit::multiline(&mut self.view.draft)
                .hint_text("Type a nudge...")
                .desired_rows(2)
                .desired_width(f32::INFINITY),
        );

        let submit = ui
            .scope_builder(egui::UiBuilder::new().id(SUBMIT_SCOPE_ID), |ui| {
                ui.button("Submit")
            })
            .inner;
        if submit.clicked() || ctrl_enter {
            let effects = self.view.on_submit();
            self.pending_effects.extend(effects);
        }
    }

    fn control_menu(&mut self, ui: &mut egui::Ui) {
        if ui.button("Send a message").clicked() {
            self.handle_host_event(HostEvent::Send, Instant::now());
            ui.close();
        }
        let users = self.view.project().online_users.to_vec();
        ui.menu_button("Online users", |ui| {
            if users.is_empty() {
                ui.weak("nobody online");
            }
            for user in &users {
                if ui.button(user).clicked() {
                    self.compose_to(user);
                    ui.close();
                }
            }
        });
        if ui.button("Refresh online users").clicked() {
            dispatch_backend_command(&self.cmd_tx, BackendCommand::RefreshUsers, &mut self.status);
            ui.close();
        }
        if ui.button("Settings...").clicked() {
            self.screen = Screen::Setup;
            ui.close();
        }
        if ui.button("Hide").clicked() {
            let effects = self.view.hide();
            self.pending_effects.extend(effects);
            ui.close();
        }
        ui.separator();
        if ui.button("Quit").clicked() {
            ui.close();
            self.quit(ui.ctx());
        }
    }

    fn run_frame(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        self.process_ui_events(now);

        if ctx.input(|i| i.viewport().close_requested()) && !self.quitting {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            let effects = self.view.hide();
            self.pending_effects.extend(effects);
        }

        let effects = self.view.tick(now);
        self.pending_effects.extend(effects);

        match self.screen {
            Screen::Setup => self.show_setup_screen(ctx),
            Screen::Widget => self.show_widget(ctx),
        }

        let effects = std::mem::take(&mut self.pending_effects);
        apply_effects(effects, ctx, &self.cmd_tx, &mut self.status);

        let next_repaint = self
            .view
            .auto_hide_deadline()
            .map(|deadline| deadline.saturating_duration_since(now).min(IDLE_REPAINT))
            .unwrap_or(IDLE_REPAINT);
        ctx.request_repaint_after(next_repaint);
    }

    fn mascot_texture(&mut self, ctx: &egui::Context, source: &str) -> Option<egui::TextureHandle> {
        let stale = self
            .mascot
            .as_ref()
            .is_none_or(|mascot| mascot.source != source);
        if stale {
            let texture = match load_mascot(ctx, source) {
                Ok(texture) => Some(texture),
                Err(err) => {
                    tracing::warn!(source, "failed to load mascot image: {err}");
                    None
                }
            };
            self.mascot = Some(Mascot {
                source: source.to_string(),
                texture,
            });
        }
        self.mascot.as_ref().and_then(|mascot| mascot.texture.clone())
    }
}

impl eframe::App for WidgetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.run_frame(ctx);
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::TRANSPARENT.to_array()
    }
}

impl Drop for WidgetApp {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.cmd_tx.try_send(BackendCommand::Shutdown);
        if worker.join().is_err() {
            tracing::error!("backend worker panicked");
        }
    }
}

/// Resolves an image reference to a local file. Remote URLs are refused.
pub(crate) fn local_image_path(source: &str) -> Result<PathBuf, String> {
    let source = source.trim();
    if source.is_empty() {
        return Err("empty image reference".to_string());
    }
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if source.contains("://") {
        return Err(format!("unsupported image source '{source}'"));
    }
    Ok(PathBuf::from(source))
}

fn load_mascot(ctx: &egui::Context, source: &str) -> Result<egui::TextureHandle, String> {
    let path = local_image_path(source)?;
    let bytes = std::fs::read(&path).map_err(|err| format!("{}: {err}", path.display()))?;
    let decoded = image::load_from_memory(&bytes).map_err(|err| err.to_string())?;
    let rgba = decoded.thumbnail(MASCOT_MAX_SIDE, MASCOT_MAX_SIDE).to_rgba8();
    let [w, h] = [rgba.width() as usize, rgba.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied([w, h], rgba.as_raw());
    Ok(ctx.load_texture(
        format!("mascot:{}", path.display()),
        color_image,
        egui::TextureOptions::LINEAR,
    ))
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
