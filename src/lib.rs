pub mod account;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod logbook;
pub mod task;
pub mod textgen;
