//! Image application.
//!
//! `ImageApplier` drives the apply state machine against an injectable
//! `ImageCustomizer`; `VirtCustomize` is the libguestfs-backed default.

pub mod applier;
pub mod customizer;

pub use applier::{ApplyOptions, ApplyReport, ImageApplier};
pub use customizer::{ImageCustomizer, VirtCustomize};
