pub mod form;
pub mod health_handlers;
pub mod job_handlers;
pub mod stream_handlers;
