#![forbid(unsafe_code)]

pub mod app;
pub mod bestseller;
pub mod cli;
pub mod config;
pub mod content;
pub mod daily_cache;
pub mod export;
pub mod gemini;
pub mod image;
pub mod logging;
pub mod model;
pub mod openai;
pub mod scenes;
pub mod services;
pub mod session;
