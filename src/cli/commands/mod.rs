pub mod comment;
pub mod post;
pub mod store;
pub mod user;
