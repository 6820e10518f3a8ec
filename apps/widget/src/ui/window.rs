//! Native window visibility, reachable from the UI thread and the backend worker.

/// Window operations the controller and backend need. The backend holds one
/// of these to bring a hidden widget back when a nudge arrives.
pub trait WindowControl: Send + Sync {
    fn set_visible(&self, visible: bool);
    fn request_repaint(&self);
}

impl WindowControl for egui::Context {
    fn set_visible(&self, visible: bool) {
        self.send_viewport_cmd(egui::ViewportCommand::Visible(visible));
        if visible {
            self.send_viewport_cmd(egui::ViewportCommand::Focus);
        }
        self.request_repaint();
    }

    fn request_repaint(&self) {
        egui::Context::request_repaint(self);
    }
}
