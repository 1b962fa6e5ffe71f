//! Lifecycle hooks.
//!
//! A [`Hook`] is a shared async callable. Hooks in one slot start together
//! by default; wrap them with [`serial`] when each must wait for the one
//! before it. Callback-style functions are adapted with
//! [`Hook::from_callback`].

use crate::bundler::error::{Error, Result};
use crate::bundler::targets::{Arch, Platform, Target};
use futures::future::{BoxFuture, try_join_all};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

/// The future every hook normalizes to.
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A user-supplied lifecycle callable.
pub struct Hook<A>(Arc<dyn Fn(A) -> HookFuture + Send + Sync>);

impl<A> Clone for Hook<A> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A> fmt::Debug for Hook<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

impl<A> Hook<A> {
    /// Starts the hook.
    pub fn call(&self, args: A) -> HookFuture {
        (self.0)(args)
    }
}

impl<A: Send + 'static> Hook<A> {
    /// Wraps an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |args: A| -> HookFuture { Box::pin(f(args)) }))
    }

    /// Wraps a function that signals completion through [`Done`] instead of
    /// returning a future.
    ///
    /// Dropping `Done` without calling it fails the hook.
    pub fn from_callback<F>(f: F) -> Self
    where
        F: Fn(A, Done) + Send + Sync + 'static,
    {
        Self::new(move |args: A| {
            let (tx, rx) = oneshot::channel();
            f(args, Done(tx));
            async move {
                rx.await.map_err(|_| {
                    anyhow::anyhow!("hook returned without calling its completion callback")
                })?
            }
        })
    }
}

/// Completion signal handed to callback-style hooks.
pub struct Done(oneshot::Sender<anyhow::Result<()>>);

impl Done {
    /// Reports success.
    pub fn ok(self) {
        self.finish(Ok(()));
    }

    /// Reports failure.
    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.finish(Err(error.into()));
    }

    /// Reports an outcome.
    pub fn finish(self, outcome: anyhow::Result<()>) {
        // The receiver only disappears when the packager itself is gone.
        let _ = self.0.send(outcome);
    }
}

/// Combines hooks into one that runs them strictly one after another.
pub fn serial<A>(hooks: Vec<Hook<A>>) -> Hook<A>
where
    A: Clone + Send + Sync + 'static,
{
    let hooks = Arc::new(hooks);
    Hook::new(move |args: A| {
        let hooks = Arc::clone(&hooks);
        async move {
            for hook in hooks.iter() {
                hook.call(args.clone()).await?;
            }
            Ok(())
        }
    })
}

/// Runs every hook of a slot concurrently.
///
/// All hooks are started before any is awaited. The first failure is
/// returned and the hooks still pending are dropped.
pub async fn run_hooks<A: Clone>(slot: &'static str, hooks: &[Hook<A>], args: A) -> Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    log::debug!("Running {} {} hook(s)", hooks.len(), slot);

    try_join_all(hooks.iter().map(|hook| hook.call(args.clone())))
        .await
        .map_err(|source| Error::Hook { slot, source })?;
    Ok(())
}

/// Arguments passed to every per-target hook.
#[derive(Clone, Debug)]
pub struct HookArgs {
    /// Directory the hook applies to (build dir, app dir, staging or final path)
    pub path: PathBuf,
    /// Electron version being packaged
    pub electron_version: String,
    /// Target platform
    pub platform: Platform,
    /// Target architecture
    pub arch: Arch,
}

/// A per-target hook.
pub type TargetHook = Hook<HookArgs>;

/// Every hook slot the packager fires.
#[derive(Clone, Debug, Default)]
pub struct Hooks {
    /// Before the app source is copied into the template
    pub before_copy: Vec<TargetHook>,
    /// After the app source is copied
    pub after_copy: Vec<TargetHook>,
    /// Before devDependencies are pruned from the copy
    pub before_prune: Vec<TargetHook>,
    /// After devDependencies are pruned
    pub after_prune: Vec<TargetHook>,
    /// Before the asar archive is built
    pub before_asar: Vec<TargetHook>,
    /// After the asar archive replaced the app directory
    pub after_asar: Vec<TargetHook>,
    /// After the Electron zip is extracted; receives the build directory
    pub after_extract: Vec<TargetHook>,
    /// After the staged app is initialized; receives the staging path
    pub after_initialize: Vec<TargetHook>,
    /// After extra resources were copied; receives the staging path
    pub after_copy_extra_resources: Vec<TargetHook>,
    /// After the bundle reached its final path; receives the final path
    pub after_complete: Vec<TargetHook>,
    /// Once per run with every target about to be built
    pub after_finalize_targets: Vec<Hook<Vec<Target>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str, delay: u64) -> Hook<u32> {
        let log = Arc::clone(log);
        Hook::new(move |_: u32| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:start"));
                tokio::time::sleep(Duration::from_millis(delay)).await;
                log.lock().unwrap().push(format!("{name}:end"));
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn serial_hooks_never_interleave() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = serial(vec![
            recorder(&log, "first", 30),
            recorder(&log, "second", 1),
        ]);
        run_hooks("after_copy", &[hook], 0).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:start", "first:end", "second:start", "second:end"]
        );
    }

    #[tokio::test]
    async fn parallel_hooks_start_together() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = vec![recorder(&log, "slow", 50), recorder(&log, "fast", 1)];
        run_hooks("after_copy", &hooks, 0).await.unwrap();
        let log = log.lock().unwrap();
        let fast_end = log.iter().position(|e| e == "fast:end").unwrap();
        let slow_end = log.iter().position(|e| e == "slow:end").unwrap();
        let slow_start = log.iter().position(|e| e == "slow:start").unwrap();
        assert!(slow_start < fast_end);
        assert!(fast_end < slow_end);
    }

    #[tokio::test]
    async fn callback_hooks_are_awaited() {
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let hook = Hook::from_callback(move |value: u32, done: Done| {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                *counter.lock().unwrap() += value;
                done.ok();
            });
        });
        run_hooks("after_extract", &[hook], 7).await.unwrap();
        assert_eq!(*hits.lock().unwrap(), 7);
    }

    #[tokio::test]
    async fn failures_propagate_with_slot_name() {
        let failing: Hook<u32> = Hook::new(|_| async { anyhow::bail!("boom") });
        let err = run_hooks("before_asar", &[failing], 0).await.unwrap_err();
        assert!(matches!(err, Error::Hook { slot: "before_asar", .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn first_failure_cancels_pending_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Hook<u32> = Hook::new(|_| async { anyhow::bail!("early") });
        let hooks = vec![recorder(&log, "slow", 50), failing];
        let err = run_hooks("after_prune", &hooks, 0).await.unwrap_err();
        assert!(err.to_string().contains("early"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(*log.lock().unwrap(), vec!["slow:start"]);
    }

    #[tokio::test]
    async fn dropped_callback_is_an_error() {
        let hook: Hook<u32> = Hook::from_callback(|_, done| drop(done));
        assert!(run_hooks("after_complete", &[hook], 0).await.is_err());
    }

    #[tokio::test]
    async fn serial_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Hook<u32> = Hook::new(|_| async { anyhow::bail!("stop") });
        let hook = serial(vec![failing, recorder(&log, "after", 1)]);
        assert!(run_hooks("after_copy", &[hook], 0).await.is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
