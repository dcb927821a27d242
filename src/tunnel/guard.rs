use super::Scoped;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Run `body` against `resource`, then always call [`Scoped::exit`].
///
/// The body receives the resource itself. Errors the body returns are
/// handed back unchanged after cleanup; a panic inside the body is caught,
/// cleanup runs, and the panic resumes.
pub async fn scope<'r, R, F, Fut, T>(resource: &'r R, body: F) -> T
where
    R: Scoped,
    F: FnOnce(&'r R) -> Fut,
    Fut: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(body(resource)).catch_unwind().await;
    resource.exit().await;
    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingResource {
        exits: AtomicUsize,
    }

    impl Scoped for CountingResource {
        fn exit(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.exits.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn enter_yields_the_resource() {
        let resource = CountingResource::default();
        let expected: *const CountingResource = &resource;
        let same = scope(&resource, |r| async move { std::ptr::eq(r, expected) }).await;
        assert!(same);
        assert_eq!(resource.exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exit_runs_when_body_returns_error() {
        let resource = CountingResource::default();
        let result: Result<(), &str> = scope(&resource, |_| async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
        assert_eq!(resource.exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exit_runs_when_body_panics() {
        let resource = CountingResource::default();
        let caught = AssertUnwindSafe(scope(&resource, |_| async {
            if resource.exits.load(Ordering::SeqCst) == 0 {
                panic!("guarded block failed");
            }
        }))
        .catch_unwind()
        .await;

        assert!(caught.is_err());
        assert_eq!(resource.exits.load(Ordering::SeqCst), 1);
    }
}
