pub mod chat_purge;
pub mod chat_service;
pub mod health_service;
pub mod job_dispatcher;
