//! Background jobs processed by `jobs work`.

mod email_job;

pub use email_job::{email_job_handler, EmailJob};
