//! Bridge handle, interpreter gate and spawn functions.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};

use crate::command::BridgeCommand;
use crate::engine::{PreludeScript, QuickJsEngine, ScriptEngine};
use crate::error::{BridgeError, BridgeResult};
use crate::object::ObjectRef;
use crate::script::{quote, Script};
use crate::worker::run_worker;

/// Options for spawning a bridge.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Name of the worker thread, also used in log lines.
    pub name: String,
    /// Capacity of the command queue.
    pub queue_depth: usize,
    /// QuickJS heap limit in bytes.
    pub memory_limit: Option<usize>,
    /// Load the headless engine prelude that provides `pvs`.
    pub headless: bool,
    /// Extra scripts evaluated after the built-in preludes.
    pub preludes: Vec<PreludeScript>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            name: "fieldview-script".to_string(),
            queue_depth: 32,
            memory_limit: None,
            headless: true,
            preludes: Vec::new(),
        }
    }
}

impl BridgeOptions {
    /// Read prelude files from disk, in order.
    pub fn with_prelude_files<P: AsRef<Path>>(mut self, paths: &[P]) -> BridgeResult<Self> {
        for path in paths {
            let path = path.as_ref();
            let source = std::fs::read_to_string(path).map_err(|source| BridgeError::Prelude {
                path: path.to_path_buf(),
                source,
            })?;
            self.preludes
                .push(PreludeScript::new(path.display().to_string(), source));
        }
        Ok(self)
    }
}

/// Spawn a bridge backed by QuickJS.
pub fn spawn_quickjs_bridge(options: BridgeOptions) -> BridgeResult<ScriptBridge> {
    let memory_limit = options.memory_limit;
    let headless = options.headless;
    let preludes = options.preludes.clone();
    spawn_bridge(options, move || QuickJsEngine::new(memory_limit, headless, &preludes))
}

/// Spawn a bridge whose worker thread builds its engine with `make_engine`.
///
/// Blocks until the engine is ready or has failed to start.
pub fn spawn_bridge<E, F>(options: BridgeOptions, make_engine: F) -> BridgeResult<ScriptBridge>
where
    E: ScriptEngine + 'static,
    F: FnOnce() -> BridgeResult<E> + Send + 'static,
{
    tracing::debug!("[spawn_bridge] Starting {}", options.name);

    let terminated = Arc::new(AtomicBool::new(false));
    let terminated_clone = terminated.clone();

    let (cmd_tx, cmd_rx) = mpsc::channel(options.queue_depth.max(1));
    let (init_tx, init_rx) = std::sync::mpsc::sync_channel::<BridgeResult<()>>(1);

    let name = options.name.clone();
    let thread_handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            tracing::debug!("[spawn_bridge:{}] Thread started", name);
            let engine = match make_engine() {
                Ok(engine) => engine,
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));
            run_worker(&name, engine, terminated_clone, cmd_rx);
            tracing::debug!("[spawn_bridge:{}] Thread exiting", name);
        })?;

    match init_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = thread_handle.join();
            return Err(e);
        }
        Err(_) => {
            return Err(match thread_handle.join() {
                Err(_) => BridgeError::ThreadPanic,
                Ok(()) => BridgeError::ChannelClosed,
            });
        }
    }

    tracing::debug!("[spawn_bridge] {} is ready", options.name);

    Ok(ScriptBridge {
        inner: Arc::new(BridgeInner {
            name: options.name,
            gate: Mutex::new(()),
            cmd_tx: parking_lot::Mutex::new(Some(cmd_tx)),
            terminated,
            thread_handle: parking_lot::Mutex::new(Some(thread_handle)),
        }),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptBridge
// ─────────────────────────────────────────────────────────────────────────────

struct BridgeInner {
    name: String,
    /// Process-wide interpreter gate. Fair, so waiters are served in order.
    gate: Mutex<()>,
    cmd_tx: parking_lot::Mutex<Option<mpsc::Sender<BridgeCommand>>>,
    terminated: Arc<AtomicBool>,
    thread_handle: parking_lot::Mutex<Option<thread::JoinHandle<()>>>,
}

impl BridgeInner {
    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender lets the worker drain its queue and exit.
        self.cmd_tx.lock().take();
    }
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        self.terminate();
        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Shared handle to the single embedded interpreter.
///
/// All work goes through a [`ScriptSession`] obtained from [`ScriptBridge::lock`].
/// The convenience methods on the bridge each take the gate for one call.
#[derive(Clone)]
pub struct ScriptBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("name", &self.inner.name)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl ScriptBridge {
    /// Wait for exclusive access to the interpreter.
    pub async fn lock(&self) -> ScriptSession<'_> {
        let guard = self.inner.gate.lock().await;
        ScriptSession {
            bridge: self,
            _guard: guard,
        }
    }

    pub async fn execute_as(&self, owner: &str, script: &Script) -> BridgeResult<()> {
        self.lock().await.execute_as(owner, script).await
    }

    pub async fn fetch_handle(&self, name: &str) -> BridgeResult<ObjectRef> {
        self.lock().await.fetch_handle(name).await
    }

    pub async fn live_objects(&self, owner: &str) -> BridgeResult<usize> {
        self.lock().await.live_objects(owner).await
    }

    pub async fn describe(&self, handle: &ObjectRef) -> BridgeResult<serde_json::Value> {
        self.lock().await.describe(handle).await
    }

    pub async fn purge(&self, owner: &str) -> BridgeResult<usize> {
        self.lock().await.purge(owner).await
    }

    pub async fn evaluate(&self, expression: &str) -> BridgeResult<serde_json::Value> {
        self.lock().await.evaluate(expression).await
    }

    /// Stop the worker. Calls made afterwards fail with [`BridgeError::Terminated`].
    pub fn terminate(&self) {
        self.inner.terminate();
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Terminate and wait for the worker thread to finish.
    pub fn join(&self) -> BridgeResult<()> {
        self.terminate();
        if let Some(handle) = self.inner.thread_handle.lock().take() {
            handle.join().map_err(|_| BridgeError::ThreadPanic)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    async fn send_command<T, F>(&self, make_cmd: F) -> BridgeResult<T>
    where
        F: FnOnce(oneshot::Sender<BridgeResult<T>>) -> BridgeCommand,
    {
        if self.is_terminated() {
            return Err(BridgeError::Terminated);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let cmd_tx = self
                .inner
                .cmd_tx
                .lock()
                .clone()
                .ok_or(BridgeError::Terminated)?;
            cmd_tx
                .send(make_cmd(reply_tx))
                .await
                .map_err(|_| BridgeError::ChannelClosed)?;
        }

        reply_rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptSession
// ─────────────────────────────────────────────────────────────────────────────

/// Exclusive access to the interpreter. The gate is released on drop.
pub struct ScriptSession<'a> {
    bridge: &'a ScriptBridge,
    _guard: MutexGuard<'a, ()>,
}

impl ScriptSession<'_> {
    /// Run `script` as one transaction on behalf of `owner`.
    pub async fn execute_as(&self, owner: &str, script: &Script) -> BridgeResult<()> {
        if script.is_empty() {
            return Ok(());
        }
        self.execute_text(owner, &script.render()).await
    }

    /// Run raw command text as one transaction on behalf of `owner`.
    pub async fn execute_text(&self, owner: &str, body: &str) -> BridgeResult<()> {
        let owner = owner.to_string();
        let body = body.to_string();
        self.bridge
            .send_command(|reply| BridgeCommand::Execute { owner, body, reply })
            .await
    }

    pub async fn fetch_handle(&self, name: &str) -> BridgeResult<ObjectRef> {
        let name = name.to_string();
        let handle = self
            .bridge
            .send_command(|reply| BridgeCommand::Lookup { name, reply })
            .await?;
        tracing::debug!("Fetched handle {}", handle);
        Ok(handle)
    }

    /// Number of live engine objects created on behalf of `owner`.
    pub async fn live_objects(&self, owner: &str) -> BridgeResult<usize> {
        let value = self.evaluate(&format!("__fv.liveCount({})", quote(owner))).await?;
        as_count(&value)
    }

    /// The engine's view of the object behind `handle`.
    pub async fn describe(&self, handle: &ObjectRef) -> BridgeResult<serde_json::Value> {
        self.evaluate(&format!("__fv.describe({}, {})", quote(&handle.name), handle.id))
            .await
    }

    /// Release everything `owner` still holds. Returns the number of objects deleted.
    pub async fn purge(&self, owner: &str) -> BridgeResult<usize> {
        let value = self.evaluate(&format!("__fv.purge({})", quote(owner))).await?;
        as_count(&value)
    }

    pub async fn evaluate(&self, expression: &str) -> BridgeResult<serde_json::Value> {
        let expression = expression.to_string();
        self.bridge
            .send_command(|reply| BridgeCommand::Evaluate { expression, reply })
            .await
    }
}

fn as_count(value: &serde_json::Value) -> BridgeResult<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| BridgeError::engine(format!("expected a count, got {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Arg, Call};
    use tokio_test::{assert_err, assert_ok};

    fn bridge() -> ScriptBridge {
        spawn_quickjs_bridge(BridgeOptions::default()).unwrap()
    }

    fn reader(path: &str) -> Call {
        Call::engine("MEDReader").arg(Arg::Options(vec![("FileName", path.into())]))
    }

    #[tokio::test]
    async fn test_execute_and_fetch() {
        let bridge = bridge();
        let mut script = Script::new();
        script.bind("p1_src", reader("mesh.med"));
        assert_ok!(bridge.execute_as("presentation-1", &script).await);

        let handle = bridge.fetch_handle("p1_src").await.unwrap();
        assert_eq!(handle.name, "p1_src");
        assert_eq!(handle.kind, "MEDReader");
        assert!(handle.id > 0);
        assert_eq!(bridge.live_objects("presentation-1").await.unwrap(), 1);
        assert_eq!(bridge.live_objects("presentation-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_unknown_name() {
        let bridge = bridge();
        let err = bridge.fetch_handle("p9_src").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { ref name } if name == "p9_src"));
    }

    #[tokio::test]
    async fn test_failed_command_rolls_back() {
        let bridge = bridge();
        let mut first = Script::new();
        first.bind("p1_src", reader("a.med"));
        bridge.execute_as("presentation-1", &first).await.unwrap();
        let before = bridge.fetch_handle("p1_src").await.unwrap();

        // Changes, creates, deletes and unbinds, then fails.
        let mut failing = Script::new();
        failing
            .call(
                Call::engine("Set")
                    .arg(&before)
                    .arg(Arg::Options(vec![("FileName", "changed.med".into())])),
            )
            .bind("p1_tmp", reader("b.med"))
            .bind("p1_obj", Call::engine("CellDatatoPointData").arg(Arg::name("p1_tmp")))
            .release(&before)
            .call(Call::engine("NoSuchCall"));
        let err = bridge.execute_as("presentation-1", &failing).await.unwrap_err();
        assert!(err.is_engine());

        let after = bridge.fetch_handle("p1_src").await.unwrap();
        assert_eq!(after, before);
        assert_err!(bridge.fetch_handle("p1_tmp").await);
        assert_err!(bridge.fetch_handle("p1_obj").await);
        assert_eq!(bridge.live_objects("presentation-1").await.unwrap(), 1);

        let described = bridge.describe(&after).await.unwrap();
        assert_eq!(described["props"]["FileName"], "a.med");
        assert_eq!(described["alive"], true);
    }

    #[tokio::test]
    async fn test_gate_released_after_error() {
        let bridge = bridge();
        let mut failing = Script::new();
        failing.call(Call::engine("Delete").arg(Arg::name("missing")));
        assert_err!(bridge.execute_as("presentation-1", &failing).await);

        // A second session would hang forever if the first guard leaked.
        let session = tokio::time::timeout(std::time::Duration::from_secs(5), bridge.lock())
            .await
            .expect("gate still held");
        assert_eq!(session.live_objects("presentation-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_handle_is_rejected() {
        let bridge = bridge();
        let mut script = Script::new();
        script.bind("p1_src", reader("a.med"));
        bridge.execute_as("presentation-1", &script).await.unwrap();
        let old = bridge.fetch_handle("p1_src").await.unwrap();

        let mut release = Script::new();
        release.release(&old);
        bridge.execute_as("presentation-1", &release).await.unwrap();
        assert_eq!(bridge.live_objects("presentation-1").await.unwrap(), 0);

        bridge.execute_as("presentation-1", &script).await.unwrap();
        let mut reuse = Script::new();
        reuse.call(Call::engine("Set").arg(&old).arg(Arg::Options(vec![])));
        let err = bridge.execute_as("presentation-1", &reuse).await.unwrap_err();
        assert!(err.to_string().contains("stale handle"), "{}", err);
    }

    #[tokio::test]
    async fn test_delete_refuses_objects_in_use() {
        let bridge = bridge();
        let mut script = Script::new();
        script
            .bind("p1_src", reader("a.med"))
            .bind("p1_obj", Call::engine("CellDatatoPointData").arg(Arg::name("p1_src")));
        bridge.execute_as("presentation-1", &script).await.unwrap();

        let src = bridge.fetch_handle("p1_src").await.unwrap();
        let mut release = Script::new();
        release.release(&src);
        let err = bridge.execute_as("presentation-1", &release).await.unwrap_err();
        assert!(err.to_string().contains("still used by"), "{}", err);
        assert_eq!(bridge.live_objects("presentation-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purge_releases_owner_objects_and_bindings() {
        let bridge = bridge();
        let mut script = Script::new();
        script
            .bind("p1_src", reader("a.med"))
            .bind("p1_obj", Call::engine("CellDatatoPointData").arg(Arg::name("p1_src")));
        bridge.execute_as("presentation-1", &script).await.unwrap();
        let mut other = Script::new();
        other.bind("p2_src", reader("b.med"));
        bridge.execute_as("presentation-2", &other).await.unwrap();

        assert_eq!(bridge.purge("presentation-1").await.unwrap(), 2);
        assert_eq!(bridge.live_objects("presentation-1").await.unwrap(), 0);
        assert_err!(bridge.fetch_handle("p1_src").await);
        assert_ok!(bridge.fetch_handle("p2_src").await);
        assert_eq!(bridge.live_objects("presentation-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_session_spans_several_calls() {
        let bridge = bridge();
        let session = bridge.lock().await;
        let mut script = Script::new();
        script.bind("p1_src", reader("a.med"));
        session.execute_as("presentation-1", &script).await.unwrap();
        let handle = session.fetch_handle("p1_src").await.unwrap();
        assert_eq!(handle.kind, "MEDReader");
    }

    #[tokio::test]
    async fn test_empty_script_is_not_sent() {
        let bridge = bridge();
        assert_ok!(bridge.execute_as("presentation-1", &Script::new()).await);
    }

    #[tokio::test]
    async fn test_terminate() {
        let bridge = bridge();
        bridge.terminate();
        assert!(bridge.is_terminated());
        let err = bridge.fetch_handle("p1_src").await.unwrap_err();
        assert!(matches!(err, BridgeError::Terminated));
        assert_ok!(bridge.join());
    }

    #[tokio::test]
    async fn test_prelude_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.js");
        std::fs::write(&path, "globalThis.SITE_NAME = 'bench';").unwrap();

        let options = BridgeOptions::default().with_prelude_files(&[&path]).unwrap();
        let bridge = spawn_quickjs_bridge(options).unwrap();
        assert_eq!(bridge.evaluate("SITE_NAME").await.unwrap(), "bench");

        let missing = BridgeOptions::default().with_prelude_files(&[dir.path().join("missing.js")]);
        assert!(matches!(missing, Err(BridgeError::Prelude { .. })));
    }

    #[test]
    fn test_engine_init_failure_is_reported() {
        let options = BridgeOptions {
            preludes: vec![PreludeScript::new("bad.js", "syntax error here (")],
            ..Default::default()
        };
        let err = spawn_quickjs_bridge(options).unwrap_err();
        assert!(matches!(err, BridgeError::Init(_)));
    }
}
