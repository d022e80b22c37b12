//! Route handlers organized by resource

pub mod catalog;
pub mod courses;
pub mod health;
pub mod notifications;
pub mod sections;
pub mod welcome;
