//! API Routes

pub mod forms;
pub mod health;
pub mod publish;
pub mod responses;
pub mod submit;
