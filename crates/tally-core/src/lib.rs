pub mod clock;
pub mod error;
pub mod record;
pub mod remember;
pub mod status;
pub mod types;

pub use error::TallyError;
pub use remember::{normalize, RememberDoc};
pub use status::StatusSnapshot;
pub use types::*;
