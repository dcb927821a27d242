use std::sync::{LazyLock, Mutex};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Puts variables back the way they were when dropped, so a failing
/// assertion inside `with_env` cannot leak overrides into later tests.
struct EnvVarGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvVarGuard {
    fn apply(vars: &[(&str, Option<&str>)]) -> Self {
        let saved = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for (key, value) in vars {
            set_or_remove(key, *value);
        }
        Self { saved }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.iter().rev() {
            set_or_remove(key, value.as_deref());
        }
    }
}

/// Run `f` with the given variables set (`Some`) or removed (`None`),
/// restoring the previous environment afterwards, even if `f` panics.
pub(super) fn with_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let _lock = ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let _guard = EnvVarGuard::apply(vars);
    f()
}

fn set_or_remove(key: &str, value: Option<&str>) {
    // SAFETY: test-only; ENV_LOCK serializes every caller that touches
    // the environment, and it is still held while the guard restores.
    unsafe {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "BINDU_TUNNEL_TEST_ENV_RESTORE";

    #[test]
    fn values_are_visible_inside_and_restored_after() {
        let inside = with_env(&[(KEY, Some("inside"))], || std::env::var(KEY).ok());
        assert_eq!(inside.as_deref(), Some("inside"));
        assert!(with_env(&[], || std::env::var(KEY).is_err()));
    }

    #[test]
    fn panicking_body_still_restores() {
        let outcome = std::panic::catch_unwind(|| {
            with_env(&[(KEY, Some("leaked"))], || {
                if std::env::var(KEY).is_ok() {
                    panic!("assertion failed inside with_env");
                }
            });
        });

        assert!(outcome.is_err());
        assert!(with_env(&[], || std::env::var(KEY).is_err()));
    }
}
