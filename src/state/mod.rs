//! Mutable pipeline state driven by the event stream
//!
//! - Pressed-key tracking, updated first for every event
//! - Block/remap rules that rewrite or drop events before dispatch

mod pressed;
mod transform;

pub use pressed::{restore_plan, PressedState};
pub use transform::{Rewrite, Synthetic, TransformStage};
