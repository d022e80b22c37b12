//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod alert;
pub mod course;
pub mod pagination;
pub mod validation;

pub use alert::{AlertRule, SectionSelection};
pub use course::{CourseFilters, CourseId, SearchText, SectionNum};
pub use pagination::{Paginated, Pagination};
pub use validation::ValidationError;
