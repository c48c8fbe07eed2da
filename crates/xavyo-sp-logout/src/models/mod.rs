//! Request, response and delivery types for SP logout

pub mod logout;
pub mod responses;

pub use logout::*;
pub use responses::*;
