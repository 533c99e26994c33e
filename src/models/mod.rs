pub mod api;
pub mod guide;
pub mod recording;
pub mod schedule;

pub use api::*;
pub use guide::*;
pub use recording::*;
pub use schedule::*;
