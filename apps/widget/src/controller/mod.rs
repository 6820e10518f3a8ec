//! Controller layer: host events, view state transitions, and command orchestration.

pub mod events;
pub mod orchestration;
pub mod view;
