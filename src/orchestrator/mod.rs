//! Application-level orchestration utilities.
//!
//! This module owns tour lifecycle control (enter/exit/restart) and post-run
//! processing such as snapshot export. UI/CLI layers call into this module to
//! keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::{export_snapshot, process_tour_completion};
