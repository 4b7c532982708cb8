// Observer system: every entity store operation runs through a ring-ordered pipeline

pub mod context;
pub mod error;
pub mod implementations;
pub mod monitor;
pub mod pipeline;
pub mod session;
pub mod traits;

// Re-export core types
pub use context::*;
pub use error::*;
pub use monitor::*;
pub use pipeline::*;
pub use session::*;
pub use traits::*;
