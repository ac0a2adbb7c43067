//! Attribution of versions to the acting user or process.

/// Reports who is performing the current mutation.
///
/// Consulted only when `RewindConfig::track_actor` is set.
pub trait ActorResolver: Send + Sync + 'static {
    fn current_actor(&self) -> Option<String>;
}

/// Resolver for hosts without an authentication context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActor;

impl ActorResolver for NoActor {
    fn current_actor(&self) -> Option<String> {
        None
    }
}

/// Always reports the same actor. Useful for batch jobs and tests.
#[derive(Debug, Clone)]
pub struct FixedActor(pub String);

impl ActorResolver for FixedActor {
    fn current_actor(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
