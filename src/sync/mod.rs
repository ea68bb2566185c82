pub mod presence;
pub mod reconciler;

pub use presence::PresenceTracker;
pub use reconciler::Reconciler;
