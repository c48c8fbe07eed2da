//! HTTP handlers for SP logout

pub mod resume;

pub use resume::{resume_logout, ResumeQuery, SpLogoutState};
