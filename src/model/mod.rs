pub mod event;
pub mod incident;
pub mod ranger;
pub mod report;

pub use event::*;
pub use incident::*;
pub use ranger::*;
pub use report::*;
