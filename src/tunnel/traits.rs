use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// A component that owns something external which must be started and
/// later released (a tunnel client process, or a fake of one in tests).
pub trait Lifecycle: Send {
    /// Start the component. Returns the public URL on success.
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Release whatever `start` acquired. Must succeed on a component
    /// that never started or has already stopped.
    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Public URL while running.
    fn public_url(&self) -> Option<String>;
}

/// Exit half of scoped acquisition, see [`super::scope`].
pub trait Scoped: Sync {
    /// Tear down everything the scope acquired. Never fails; problems are
    /// logged by the implementation.
    fn exit(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
