pub mod blog_service;
pub mod retirement;

pub use blog_service::{AuthorSummary, BlogService, CategorySummary, PostExpansion, PostRemoval, PostView};
pub use crate::observer::implementations::{CascadeIncomplete, CascadeStep};
pub use retirement::{RetirementReport, RetirementState, RetirementWorkflow};
