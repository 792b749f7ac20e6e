pub mod position;
pub mod rules;
pub mod time_control;
pub mod types;
pub mod uci;

// Re-export the data model and the rules-oracle seam
pub use position::*;
pub use rules::*;
pub use time_control::*;
pub use types::*;
pub use uci::*;
