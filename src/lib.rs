pub mod app;
pub mod config;
pub mod depth;
pub mod feed;
pub mod logging;
pub mod marker;
pub mod plates;
pub mod render;
