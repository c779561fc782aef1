pub mod auth;
pub mod chat;
pub mod job;
pub mod policy;
pub mod user;
