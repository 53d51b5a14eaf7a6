pub mod config;
pub mod dockerfile;
pub mod index;
pub mod logging;
pub mod update;
