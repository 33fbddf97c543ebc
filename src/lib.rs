pub mod app;
pub mod chat;
pub mod circuit;
pub mod config;
pub mod error;
pub mod grid;
pub mod markup;
pub mod oracle;
pub mod presets;
pub mod quantum;
pub mod render;
pub mod run;
