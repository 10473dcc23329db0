//! Exercises the full reload -> call -> sleep -> shutdown path against a
//! real worker thread and a real `mlua::Lua` interpreter — the one
//! integration test this crate keeps alongside its colocated unit tests,
//! the way `node-sdk`'s `tests/protocol_loop.rs` does for its own
//! end-to-end loop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use habctl_domain::device::{Device, DeviceManager, Scale, SensorType};
use habctl_domain::log_sink::LogSink;
use habctl_domain::queue::MainThreadQueue;
use habctl_scripthost::{Bridge, Script, ScriptArg, ScriptState};

#[derive(Default)]
struct RecordingLogSink {
    lines: Mutex<Vec<String>>,
}

impl LogSink for RecordingLogSink {
    fn log(&self, _script: &str, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

/// Runs every submitted job immediately on the calling thread — good
/// enough for a test where nothing else contends for host-object access.
struct InlineQueue;
impl MainThreadQueue for InlineQueue {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

struct StubDevice(f64);
impl Device for StubDevice {
    fn sensor_value(&self, _t: SensorType, _s: Scale) -> Option<f64> {
        Some(self.0)
    }
}

struct StubDevices;
impl DeviceManager for StubDevices {
    fn device(&self, id: &str) -> Option<Arc<dyn Device>> {
        (id == "42").then(|| Arc::new(StubDevice(21.5)) as Arc<dyn Device>)
    }
}

fn wait_for<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn write_script(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(format!("{name}.lua"));
    std::fs::write(&path, source).unwrap();
    path
}

/// Builds a [`Script`] and immediately calls `reload()` — every caller in
/// this file wants the worker past CLOSED, not sitting there idle.
fn new_script(path: std::path::PathBuf, name: &str, log: Arc<RecordingLogSink>) -> Arc<Script> {
    let bridge = Bridge::new(Arc::new(InlineQueue), Duration::from_secs(2));
    let script = Script::new(
        path,
        name.to_string(),
        log as Arc<dyn LogSink>,
        Arc::new(StubDevices) as Arc<dyn DeviceManager>,
        bridge,
        Duration::from_millis(50),
    );
    script.reload().unwrap();
    script
}

/// S4: recognized signals are exactly the `on`-prefixed top-level
/// functions; a call to a non-signal name is silently rejected while a
/// call to a recognized one runs.
#[test]
fn recognized_signals_gate_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(
        &dir,
        "gate",
        r#"
function onInit() print("init") end
function onMotion(x) print("motion:" .. tostring(x)) end
function helper() print("helper-called") end
"#,
    );
    let log = Arc::new(RecordingLogSink::default());
    let script = new_script(path, "gate", log.clone());

    assert!(wait_for(Duration::from_secs(2), || log
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "init")));

    script.call("helper", vec![]);
    std::thread::sleep(Duration::from_millis(150));
    assert!(!log.lines.lock().unwrap().iter().any(|l| l == "helper-called"));

    script.call("onMotion", vec![ScriptArg::Int(1)]);
    assert!(wait_for(Duration::from_secs(2), || log
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "motion:1")));

    script.shutdown();
    assert_eq!(script.state(), ScriptState::Closed);
}

/// S5: `sleep(ms)` inside a routine yields cooperatively; two rapid calls
/// to the same signal complete in the order they were made, each no
/// earlier than its requested delay.
#[test]
fn cooperative_sleep_preserves_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(
        &dir,
        "ticker",
        r#"
counter = 0
function onTick()
  sleep(300)
  counter = counter + 1
  print(tostring(counter))
end
"#,
    );
    let log = Arc::new(RecordingLogSink::default());
    let script = new_script(path, "ticker", log.clone());

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Idle)
    }));

    let start = Instant::now();
    script.call("onTick", vec![]);
    script.call("onTick", vec![]);

    assert!(wait_for(Duration::from_secs(2), || log
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|l| l.as_str() == "1" || l.as_str() == "2")
        .count()
        == 2));

    assert!(start.elapsed() >= Duration::from_millis(300));

    let lines = log.lines.lock().unwrap();
    let counts: Vec<&String> = lines.iter().filter(|l| l.as_str() == "1" || l.as_str() == "2").collect();
    assert_eq!(counts, vec!["1", "2"]);

    drop(lines);
    script.shutdown();
}

/// S6: guest code reaches a host object only through the bridge; a bound
/// method call is proxied to the main loop and the return value is
/// delivered back into guest code.
#[test]
fn bridge_proxies_device_manager_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(
        &dir,
        "sensor",
        r#"
function onCheck()
  local v = deviceManager:device("42"):sensorValue("temperature", "celsius")
  print("temp:" .. tostring(v))
end
"#,
    );
    let log = Arc::new(RecordingLogSink::default());
    let script = new_script(path, "sensor", log.clone());

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Idle)
    }));

    script.call("onCheck", vec![]);
    assert!(wait_for(Duration::from_secs(2), || log
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "temp:21.5")));

    script.shutdown();
}

/// A reload after a script is already running re-derives the recognized
/// signal set from the new source.
#[test]
fn reload_replaces_recognized_signals() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(&dir, "reloadable", "function onInit() end");
    let log = Arc::new(RecordingLogSink::default());
    let script = new_script(path.clone(), "reloadable", log.clone());

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Idle)
    }));

    std::fs::write(&path, "function onInit() end\nfunction onArrive() print(\"arrived\") end").unwrap();
    script.reload().unwrap();

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Idle)
    }));

    script.call("onArrive", vec![]);
    assert!(wait_for(Duration::from_secs(2), || log
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "arrived")));

    script.shutdown();
}

/// A script that fails to load goes to ERROR but its worker stays alive
/// to accept a later `reload()`.
#[test]
fn load_error_keeps_worker_alive_for_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(&dir, "broken", "this is not valid lua (((");
    let log = Arc::new(RecordingLogSink::default());
    let script = new_script(path.clone(), "broken", log.clone());

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Error)
    }));

    std::fs::write(&path, "function onInit() end").unwrap();
    script.reload().unwrap();

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(script.state(), ScriptState::Idle)
    }));

    script.shutdown();
}
