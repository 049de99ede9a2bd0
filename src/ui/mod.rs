pub mod icons;
pub mod progress;

pub use progress::{SessionUI, SnapshotDiff, UiEvent, UiMode};
