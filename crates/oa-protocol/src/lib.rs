pub mod context;
pub mod generation;
pub mod history;

pub use context::*;
pub use generation::*;
pub use history::*;
