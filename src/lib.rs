pub mod command;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod event;
pub mod message;
pub mod nlu;
pub mod session;
pub mod transport;
pub mod webhook;
