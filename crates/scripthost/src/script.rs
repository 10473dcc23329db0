//! §4.4 Script Host (C7): one worker thread per script runs the
//! load/dispatch loop: under the task-queue lock, dequeue a task if one
//! is waiting, otherwise wait. [`next_action`] re-checks `state` fresh on
//! every lock acquisition rather than snapshotting it once per loop
//! iteration, so a `shutdown()` racing a just-dequeued task can't be
//! silently dropped. The CLOSING→CLOSED transition is checked strictly in
//! the "no task available" branch.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use habctl_domain::device::DeviceManager;
use habctl_domain::error::Result;
use habctl_domain::log_sink::LogSink;
use habctl_domain::trace::TraceEvent;
use mlua::{Lua, RegistryKey, Thread, Value};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::bridge::{Bridge, DeviceManagerHost, HostHandle};
use crate::state::ScriptState;
use crate::task::{ScriptArg, Task};
use crate::whitelist;

/// Holds the routine currently executing on the worker, so the guest
/// `suspend()` binding can capture it from inside a host-bound Lua
/// closure without pulling in a `!Send` cell — the `mlua` `send` feature
/// requires every closure registered with `create_function` to be `Send`,
/// and `mlua::Thread` itself is `Send` under that feature.
type CurrentThread = Arc<Mutex<Option<Thread>>>;

struct WorkerInner {
    state: ScriptState,
    source: String,
    queue: VecDeque<Task>,
    pending_timers: Vec<Arc<AtomicBool>>,
}

/// State shared between the public [`Script`] handle and its worker thread.
struct ScriptShared {
    filename: PathBuf,
    name: String,
    worker: (Mutex<WorkerInner>, Condvar),
    recognized_signals: RwLock<Arc<HashSet<String>>>,
    log_sink: Arc<dyn LogSink>,
    devices: Arc<dyn DeviceManager>,
    bridge: Arc<Bridge>,
    poll_interval: Duration,
}

enum NextAction {
    Load,
    Dispatch(Task),
    Closed,
    Continue,
}

impl ScriptShared {
    fn set_state(&self, inner: &mut WorkerInner, new: ScriptState) {
        if inner.state == new {
            return;
        }
        TraceEvent::ScriptStateChanged {
            script: self.name.clone(),
            from: inner.state.as_str().to_string(),
            to: new.as_str().to_string(),
        }
        .emit();
        inner.state = new;
    }

    fn abort_pending_timers(&self, inner: &mut WorkerInner) {
        for flag in inner.pending_timers.drain(..) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn next_action(&self) -> NextAction {
        let (lock, cvar) = &self.worker;
        let mut inner = lock.lock();

        if matches!(inner.state, ScriptState::Closing | ScriptState::Loading) {
            self.abort_pending_timers(&mut inner);
        }

        if inner.state == ScriptState::Loading {
            return NextAction::Load;
        }

        if let Some(task) = inner.queue.pop_front() {
            return NextAction::Dispatch(task);
        }

        cvar.wait_for(&mut inner, self.poll_interval);

        if inner.state == ScriptState::Closing {
            self.set_state(&mut inner, ScriptState::Closed);
            return NextAction::Closed;
        }
        NextAction::Continue
    }

    fn run(self: Arc<Self>) {
        let mut live: Option<(Lua, CurrentThread)> = None;
        loop {
            match self.next_action() {
                NextAction::Closed => return,
                NextAction::Continue => continue,
                NextAction::Load => live = self.perform_load(),
                NextAction::Dispatch(task) => {
                    if let Some((lua, current_thread)) = &live {
                        self.dispatch_task(lua, current_thread, task);
                    }
                    // No loaded interpreter yet (load failed, or a task
                    // raced the very first load): drop it silently, the
                    // script just stays inert in the ERROR state.
                }
            }
        }
    }

    /// §4.4 `__load`. One fresh interpreter per reload; on any error the
    /// script goes to ERROR but the worker keeps running to accept a later
    /// `reload()`. Returns the new interpreter (and its current-routine
    /// cell, mutated by `suspend()`) on success.
    fn perform_load(self: &Arc<Self>) -> Option<(Lua, CurrentThread)> {
        let source = {
            let (lock, _) = &self.worker;
            lock.lock().source.clone()
        };

        let lua = Lua::new();
        let current_thread: CurrentThread = Arc::new(Mutex::new(None));

        if let Err(e) = self.install_host_bindings(&lua, &current_thread) {
            self.fail_load(&format!("could not install host bindings: {e}"));
            return None;
        }

        if let Err(e) = whitelist::sandbox(&lua) {
            self.fail_load(&format!("could not sandbox interpreter: {e}"));
            return None;
        }

        if let Err(e) = lua.load(&source).set_name(&self.name).exec() {
            self.fail_load(&format!("could not execute lua script {}: {e}", self.name));
            return None;
        }

        let recognized = self.collect_recognized_signals(&lua);
        *self.recognized_signals.write() = Arc::new(recognized);

        let (lock, cvar) = &self.worker;
        {
            let mut inner = lock.lock();
            self.set_state(&mut inner, ScriptState::Idle);
            inner.queue.push_back(Task::Signal("onInit".to_string(), Vec::new()));
        }
        cvar.notify_all();

        self.log_sink.log(&self.name, &format!("Script {} loaded", self.name));
        Some((lua, current_thread))
    }

    fn fail_load(&self, message: &str) {
        let (lock, _) = &self.worker;
        let mut inner = lock.lock();
        self.set_state(&mut inner, ScriptState::Error);
        drop(inner);
        self.log_sink.log(&self.name, message);
    }

    /// Bind `print`, `suspend`/`sleep`, and `deviceManager` — §4.4 steps 2-4.
    fn install_host_bindings(self: &Arc<Self>, lua: &Lua, current_thread: &CurrentThread) -> mlua::Result<()> {
        let log_sink = self.log_sink.clone();
        let name = self.name.clone();
        let print_fn = lua.create_function(move |_, mut args: mlua::Variadic<Value>| {
            if args.is_empty() {
                log_sink.log(&name, "");
                return Ok(());
            }
            let msg_val = args.remove(0);
            let msg = lua_value_to_string(&msg_val);
            let formatted = format_log_message(&msg, &args);
            TraceEvent::ScriptLogEmitted {
                script: name.clone(),
                message: formatted.clone(),
            }
            .emit();
            log_sink.log(&name, &formatted);
            Ok(())
        })?;
        lua.globals().set("print", print_fn)?;

        let shared = self.clone();
        let ct = current_thread.clone();
        let suspend_fn = lua.create_function(move |lua, ms: u64| {
            let thread = ct
                .lock()
                .clone()
                .ok_or_else(|| mlua::Error::RuntimeError("suspend() called outside a routine".into()))?;
            let key = lua.create_registry_value(thread)?;
            shared.schedule_resume(key, ms);
            Ok(())
        })?;
        lua.globals().set("suspend", suspend_fn)?;

        lua.load("function sleep(ms) suspend(ms); coroutine.yield() end")
            .set_name("sleep")
            .exec()?;

        let device_host: Arc<dyn habctl_domain::host::HostObject> =
            Arc::new(DeviceManagerHost(self.devices.clone()));
        let handle = HostHandle::new(device_host, self.bridge.clone());
        lua.globals().set("deviceManager", handle)?;

        Ok(())
    }

    fn collect_recognized_signals(&self, lua: &Lua) -> HashSet<String> {
        let mut set = HashSet::new();
        let globals = lua.globals();
        for pair in globals.pairs::<String, Value>() {
            let Ok((name, value)) = pair else { continue };
            if name.starts_with("on") && matches!(value, Value::Function(_)) {
                set.insert(name);
            }
        }
        set
    }

    fn dispatch_task(self: &Arc<Self>, lua: &Lua, current_thread: &CurrentThread, task: Task) {
        let thread = match task {
            Task::Signal(name, args) => {
                let func: mlua::Function = match lua.globals().get(name.as_str()) {
                    Ok(f) => f,
                    Err(_) => {
                        self.log_sink.log(&self.name, &format!("no such signal handler: {name}"));
                        return;
                    }
                };
                let thread = match lua.create_thread(func) {
                    Ok(t) => t,
                    Err(e) => {
                        self.log_sink.log(&self.name, &format!("could not start routine {name}: {e}"));
                        return;
                    }
                };
                let lua_args: mlua::Result<Vec<Value>> = args.into_iter().map(|a| a.into_lua(lua)).collect();
                let lua_args = match lua_args {
                    Ok(a) => a,
                    Err(e) => {
                        self.log_sink.log(&self.name, &format!("bad arguments for {name}: {e}"));
                        return;
                    }
                };
                *current_thread.lock() = Some(thread.clone());
                self.set_running();
                let result: mlua::Result<mlua::MultiValue> = thread.resume(mlua::MultiValue::from_vec(lua_args));
                self.finish_step(result);
                return;
            }
            Task::Resume(key) => match lua.registry_value::<Thread>(&key) {
                Ok(t) => {
                    let _ = lua.remove_registry_value(key);
                    t
                }
                Err(e) => {
                    self.log_sink.log(&self.name, &format!("could not resume parked routine: {e}"));
                    return;
                }
            },
        };

        *current_thread.lock() = Some(thread.clone());
        self.set_running();
        let result: mlua::Result<mlua::MultiValue> = thread.resume(());
        self.finish_step(result);
    }

    fn set_running(&self) {
        let (lock, _) = &self.worker;
        let mut inner = lock.lock();
        self.set_state(&mut inner, ScriptState::Running);
    }

    fn finish_step(&self, result: mlua::Result<mlua::MultiValue>) {
        if let Err(e) = result {
            self.log_sink.log(&self.name, &format!("routine error: {e}"));
        }
        let (lock, _) = &self.worker;
        let mut inner = lock.lock();
        // A routine that called `suspend()` and yielded is still "parked",
        // not idle, but there is no separate state for that in §3's
        // lifecycle enum — IDLE covers both "nothing running" cases.
        self.set_state(&mut inner, ScriptState::Idle);
    }

    /// §4.4 "Cooperative sleep": pin the routine in the registry, track a
    /// cancel flag, and enqueue its resume once `ms` elapses unless the
    /// flag was tripped by an abort in the meantime.
    fn schedule_resume(self: &Arc<Self>, key: RegistryKey, ms: u64) {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let (lock, _) = &self.worker;
            lock.lock().pending_timers.push(cancelled.clone());
        }

        let shared = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            let (lock, cvar) = &shared.worker;
            let mut inner = lock.lock();
            inner.pending_timers.retain(|f| !Arc::ptr_eq(f, &cancelled));
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            inner.queue.push_back(Task::Resume(key));
            drop(inner);
            cvar.notify_all();
        });
    }
}

fn lua_value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_str().map(|s| s.to_string()).unwrap_or_default(),
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(f) => f.to_string(),
        other => format!("{other:?}"),
    }
}

/// §4.4 step 2: `"msg" % args`-style formatting, falling back to the raw
/// message whenever the format spec and the argument list don't line up.
fn format_log_message(msg: &str, args: &[Value]) -> String {
    let mut result = String::with_capacity(msg.len());
    let mut chars = msg.chars().peekable();
    let mut arg_iter = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                result.push('%');
            }
            Some('s') | Some('d') | Some('f') | Some('q') => {
                chars.next();
                match arg_iter.next() {
                    Some(v) => result.push_str(&lua_value_to_string(v)),
                    None => return msg.to_string(),
                }
            }
            _ => return msg.to_string(),
        }
    }
    result
}

/// Public handle to a script's worker. Owns the thread's `JoinHandle`
/// separately from [`ScriptShared`] so `shutdown()` can join it after
/// requesting the CLOSING transition.
pub struct Script {
    shared: Arc<ScriptShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Script {
    pub fn new(
        filename: PathBuf,
        name: String,
        log_sink: Arc<dyn LogSink>,
        devices: Arc<dyn DeviceManager>,
        bridge: Arc<Bridge>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let shared = Arc::new(ScriptShared {
            filename,
            name,
            worker: (
                Mutex::new(WorkerInner {
                    state: ScriptState::Closed,
                    source: String::new(),
                    queue: VecDeque::new(),
                    pending_timers: Vec::new(),
                }),
                Condvar::new(),
            ),
            recognized_signals: RwLock::new(Arc::new(HashSet::new())),
            log_sink,
            devices,
            bridge,
            poll_interval,
        });

        let worker_shared = shared.clone();
        let thread_name = worker_shared.name.clone();
        let handle = std::thread::Builder::new()
            .name(format!("script-{thread_name}"))
            .spawn(move || worker_shared.run())
            .expect("spawn script worker thread");

        Arc::new(Self {
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// §4.4 `reload`: reads source on the caller's thread, leaving the
    /// worker to pick it up via the LOADING transition.
    pub fn reload(&self) -> Result<()> {
        let source = fs::read_to_string(&self.shared.filename)?;
        let (lock, cvar) = &self.shared.worker;
        {
            let mut inner = lock.lock();
            inner.source = source;
            self.shared.set_state(&mut inner, ScriptState::Loading);
        }
        cvar.notify_all();
        Ok(())
    }

    /// §8 property 2 / §4.4 `call`.
    pub fn call(&self, name: &str, args: Vec<ScriptArg>) {
        let recognized = self.shared.recognized_signals.read().clone();
        let (lock, cvar) = &self.shared.worker;
        let mut inner = lock.lock();

        if !matches!(inner.state, ScriptState::Running | ScriptState::Idle) || !recognized.contains(name) {
            TraceEvent::SignalRejected {
                script: self.shared.name.clone(),
                signal: name.to_string(),
                state: inner.state.as_str().to_string(),
            }
            .emit();
            return;
        }

        inner.queue.push_back(Task::Signal(name.to_string(), args));
        TraceEvent::SignalEnqueued {
            script: self.shared.name.clone(),
            signal: name.to_string(),
        }
        .emit();
        drop(inner);
        cvar.notify_all();
    }

    pub fn state(&self) -> ScriptState {
        self.shared.worker.0.lock().state
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// §4.4 `shutdown`: set CLOSING, wake the worker, join, log "unloaded".
    pub fn shutdown(&self) {
        {
            let (lock, cvar) = &self.shared.worker;
            let mut inner = lock.lock();
            self.shared.set_state(&mut inner, ScriptState::Closing);
            drop(inner);
            cvar.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        self.shared
            .log_sink
            .log(&self.shared.name, &format!("Script {} unloaded", self.shared.name));
    }
}
