//! Live Space sessions: listening → transitioning → live, with placeholder
//! participants, transcript and invite targets generated on timers.

pub mod error;
pub mod generator;
pub mod manager;
pub mod session;

pub use error::SpaceError;
pub use manager::SpaceManager;
pub use session::SpaceSession;
