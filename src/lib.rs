pub mod auth;
pub mod config;
pub mod engine;
pub mod forwarder;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod sql;
pub mod tls;
pub mod wal;
pub mod wire;
