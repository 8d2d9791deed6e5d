// HTTP routes
pub mod health;
pub mod jobs;
pub mod metadata;
pub mod stream;

pub use health::*;
pub use jobs::*;
pub use metadata::*;
pub use stream::*;
