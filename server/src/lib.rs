pub mod boxes;
pub mod config;
pub mod entries;
pub mod http;
pub mod secrets;
pub mod storage;
