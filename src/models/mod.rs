pub mod analysis;
pub mod complaint;
pub mod document;

pub use analysis::*;
pub use complaint::*;
pub use document::*;
