//! View state for the widget and the transitions driven by host events.
//!
//! Every handler mutates [`ViewState`] and returns the side effects the shell
//! has to carry out (window visibility, outbound messages). Rendering reads
//! only [`ViewState::project`].

use std::time::{Duration, Instant};

pub const AUTO_HIDE_DELAY: Duration = Duration::from_secs(5);

pub const GREETING: &str = "Waiting for nudges...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Prompt,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEffect {
    ShowWindow,
    HideWindow,
    SendMessage { receiver: String, text: String },
}

/// Single pending auto-hide deadline. Re-arming replaces the previous one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoHideTimer {
    deadline: Option<Instant>,
}

impl AutoHideTimer {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// What the renderer draws. Derived from [`ViewState`] and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel<'a> {
    pub message_text: &'a str,
    pub message_sender: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub show_prompt: bool,
    pub show_chat: bool,
    pub background: Background,
    pub online_users: &'a [String],
    pub selected_user: Option<&'a str>,
    pub top_padding: f32,
}

#[derive(Debug)]
pub struct ViewState {
    message_text: String,
    message_sender: Option<String>,
    image_url: Option<String>,
    panel: Panel,
    online_users: Vec<String>,
    selected_user: Option<String>,
    pub draft: String,
    header_padding: Option<f32>,
    window_visible: bool,
    auto_hide: AutoHideTimer,
    auto_hide_delay: Duration,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(AUTO_HIDE_DELAY)
    }
}

impl ViewState {
    pub fn new(auto_hide_delay: Duration) -> Self {
        Self {
            message_text: GREETING.to_string(),
            message_sender: None,
            image_url: None,
            panel: Panel::Prompt,
            online_users: Vec::new(),
            selected_user: None,
            draft: String::new(),
            header_padding: None,
            window_visible: true,
            auto_hide: AutoHideTimer::default(),
            auto_hide_delay,
        }
    }

    /// `chat_message`: show `text` and (re)start the auto-hide countdown.
    pub fn on_chat_message(
        &mut self,
        from: Option<String>,
        text: String,
        now: Instant,
    ) -> Vec<ViewEffect> {
        self.message_text = text;
        self.message_sender = from;
        self.auto_hide.arm(now, self.auto_hide_delay);
        self.window_visible = true;
        vec![ViewEffect::ShowWindow]
    }

    /// `send`: switch to the chat panel and drop any pending auto-hide.
    pub fn on_send(&mut self) -> Vec<ViewEffect> {
        self.panel = Panel::Chat;
        self.auto_hide.cancel();
        self.window_visible = true;
        vec![ViewEffect::ShowWindow]
    }

    /// `online_users`: replace the dropdown entries. The current selection
    /// survives if still listed, otherwise the first entry is selected.
    pub fn on_online_users(&mut self, users: Vec<String>) {
        let keep = self
            .selected_user
            .as_ref()
            .is_some_and(|selected| users.contains(selected));
        if !keep {
            self.selected_user = users.first().cloned();
        }
        self.online_users = users;
    }

    /// First layout pass: the header's height plus its vertical margins
    /// becomes the container's top padding. Later measurements are ignored.
    pub fn on_layout_measured(
        &mut self,
        content_height: f32,
        margin_top: f32,
        margin_bottom: f32,
    ) -> bool {
        if self.header_padding.is_some() {
            return false;
        }
        self.header_padding = Some((content_height + margin_top + margin_bottom).max(0.0));
        true
    }

    /// Submit: emit exactly one outbound message, go back to the prompt panel
    /// and hide the window.
    pub fn on_submit(&mut self) -> Vec<ViewEffect> {
        let receiver = self.selected_user.clone().unwrap_or_default();
        let text = std::mem::take(&mut self.draft);
        self.panel = Panel::Prompt;
        self.auto_hide.cancel();
        self.window_visible = false;
        vec![
            ViewEffect::SendMessage { receiver, text },
            ViewEffect::HideWindow,
        ]
    }

    /// Drives the auto-hide countdown; call once per frame.
    pub fn tick(&mut self, now: Instant) -> Vec<ViewEffect> {
        if self.auto_hide.fire_if_due(now) && self.window_visible {
            self.window_visible = false;
            return vec![ViewEffect::HideWindow];
        }
        Vec::new()
    }

    pub fn hide(&mut self) -> Vec<ViewEffect> {
        self.auto_hide.cancel();
        self.window_visible = false;
        vec![ViewEffect::HideWindow]
    }

    pub fn select_user(&mut self, user: &str) {
        if self.online_users.iter().any(|u| u == user) {
            self.selected_user = Some(user.to_string());
        }
    }

    pub fn set_image(&mut self, url: Option<String>) {
        self.image_url = url;
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn window_visible(&self) -> bool {
        self.window_visible
    }

    pub fn layout_measured(&self) -> bool {
        self.header_padding.is_some()
    }

    pub fn auto_hide_deadline(&self) -> Option<Instant> {
        self.auto_hide.deadline()
    }

    pub fn project(&self) -> ViewModel<'_> {
        let chat = self.panel == Panel::Chat;
        ViewModel {
            message_text: &self.message_text,
            message_sender: self.message_sender.as_deref(),
            image_url: self.image_url.as_deref(),
            show_prompt: !chat,
            show_chat: chat,
            background: if chat {
                Background::Alert
            } else {
                Background::Transparent
            },
            online_users: &self.online_users,
            selected_user: self.selected_user.as_deref(),
            top_padding: self.header_padding.unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
