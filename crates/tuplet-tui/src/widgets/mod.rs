pub mod pane;
pub mod progress;
pub mod toast;
