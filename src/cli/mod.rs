pub mod fetch;
pub mod files;
pub mod setup;
pub mod ui;
