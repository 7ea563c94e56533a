pub mod analyze;
pub mod info;
pub mod setup;
pub mod ui;
