pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod models;
pub mod observer;
pub mod services;

pub use error::BlogError;
