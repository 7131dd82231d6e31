pub mod audit;
pub mod auth;
pub mod bot;
pub mod channels;
pub mod chat;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod history;
pub mod providers;
pub mod session;
pub mod storage;
pub mod utils;
