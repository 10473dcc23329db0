//! §4.5 Cross-Thread Attribute Bridge (C8). The worker thread never touches
//! a [`HostObject`] directly; every getter/method call crosses over to the
//! main loop through [`Bridge`], which owns the per-call reply slot the
//! design notes (§9) ask for in place of one shared condition variable.

use std::sync::Arc;
use std::time::Duration;

use habctl_domain::device::{Device, DeviceManager, Scale, SensorType};
use habctl_domain::error::{Error, Result};
use habctl_domain::host::{AttrValue, HostObject};
use habctl_domain::queue::MainThreadQueue;
use mlua::{Lua, MetaMethod, UserData, UserDataMethods, Value};
use parking_lot::{Condvar, Mutex};

/// Owns the main-thread queue handle and the bridge-call timeout; shared by
/// every [`HostHandle`] a script's load creates.
pub struct Bridge {
    queue: Arc<dyn MainThreadQueue>,
    timeout: Duration,
}

impl Bridge {
    pub fn new(queue: Arc<dyn MainThreadQueue>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self { queue, timeout })
    }

    /// §4.5 setter contract: fire-and-forget.
    fn set_attr(&self, obj: Arc<dyn HostObject>, name: String, value: AttrValue) {
        self.queue.submit(Box::new(move || {
            if let Err(e) = obj.set_attr(&name, value) {
                tracing::warn!(attr = %name, error = %e, "host setattr failed");
            }
        }));
    }

    /// §4.5 getter-proxy contract: submit the call, wait up to `timeout` on
    /// this call's own reply slot, and translate a timed-out wait into
    /// `Error::BridgeTimeout`.
    fn call_blocking(&self, obj: Arc<dyn HostObject>, method: String, args: Vec<AttrValue>) -> Result<AttrValue> {
        let slot = Arc::new((Mutex::new(None::<std::result::Result<AttrValue, String>>), Condvar::new()));
        let slot2 = slot.clone();
        let method_for_job = method.clone();

        self.queue.submit(Box::new(move || {
            let result = obj.call_method(&method_for_job, args).map_err(|e| e.to_string());
            let (lock, cvar) = &*slot2;
            *lock.lock() = Some(result);
            cvar.notify_all();
        }));

        let (lock, cvar) = &*slot;
        let mut guard = lock.lock();
        loop {
            if guard.is_some() {
                break;
            }
            let wait = cvar.wait_for(&mut guard, self.timeout);
            if wait.timed_out() && guard.is_none() {
                return Err(Error::BridgeTimeout(method));
            }
        }

        match guard.take().expect("checked Some above") {
            Ok(v) => Ok(v),
            Err(msg) => Err(Error::Sandbox(msg)),
        }
    }
}

/// The userdata a host object is wrapped in before it can be reached from
/// guest code — §4.5's getter/setter contract, implemented via mlua's
/// `Index`/`NewIndex` metamethods.
pub struct HostHandle {
    obj: Arc<dyn HostObject>,
    bridge: Arc<Bridge>,
}

impl HostHandle {
    pub fn new(obj: Arc<dyn HostObject>, bridge: Arc<Bridge>) -> Self {
        Self { obj, bridge }
    }

    fn get(&self, lua: &Lua, key: Value) -> mlua::Result<Value> {
        if let Value::Integer(i) = key {
            return match self.obj.index(i) {
                Some(v) => attr_to_lua(lua, v, self.bridge.clone()),
                None => Err(mlua::Error::RuntimeError(format!("index {i} out of range"))),
            };
        }

        let Value::String(name) = key else {
            return Err(mlua::Error::RuntimeError("unsupported attribute key".into()));
        };
        let name = name.to_str()?.to_string();

        let Some(value) = self.obj.get_attr(&name) else {
            return Err(mlua::Error::RuntimeError(format!("attribute not found: {name}")));
        };

        // Bare attribute access never hands back a nested object; only
        // sequence indexing (above) may.
        habctl_domain::host::reject_bare_object(value, &name)
            .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
            .and_then(|v| attr_to_lua(lua, v, self.bridge.clone()))
    }

    fn set(&self, key: Value, value: Value) -> mlua::Result<()> {
        let Value::String(name) = key else {
            return Err(mlua::Error::RuntimeError("unsupported attribute key".into()));
        };
        let name = name.to_str()?.to_string();
        let attr = lua_to_attr(&value).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
        self.bridge.set_attr(self.obj.clone(), name, attr);
        Ok(())
    }
}

impl UserData for HostHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| this.get(lua, key));
        methods.add_meta_method(MetaMethod::NewIndex, |_, this, (key, value): (Value, Value)| {
            this.set(key, value)
        });
    }
}

fn attr_to_lua(lua: &Lua, value: AttrValue, bridge: Arc<Bridge>) -> mlua::Result<Value> {
    Ok(match value {
        AttrValue::Nil => Value::Nil,
        AttrValue::Bool(b) => Value::Boolean(b),
        AttrValue::Int(i) => Value::Integer(i),
        AttrValue::Float(f) => Value::Number(f),
        AttrValue::Str(s) => Value::String(lua.create_string(&s)?),
        AttrValue::BoundMethod { receiver, method } => Value::Function(make_proxy(lua, receiver, method, bridge)?),
        AttrValue::Object(obj) => Value::UserData(lua.create_userdata(HostHandle::new(obj, bridge))?),
    })
}

fn lua_to_attr(value: &Value) -> Result<AttrValue> {
    match value {
        Value::Nil => Ok(AttrValue::Nil),
        Value::Boolean(b) => Ok(AttrValue::Bool(*b)),
        Value::Integer(i) => Ok(AttrValue::Int(*i)),
        Value::Number(f) => Ok(AttrValue::Float(*f)),
        Value::String(s) => Ok(AttrValue::Str(
            s.to_str().map_err(|e| Error::Other(e.to_string()))?.to_string(),
        )),
        other => Err(Error::AttributeTypeNotAllowed(format!("{other:?}"))),
    }
}

/// `obj:method(...)` proxy: the Lua colon-call passes `obj` itself as the
/// first argument, which is discarded here since the receiver is already
/// bound explicitly (§4.5: "unbind to support `obj:method()` ... with
/// explicit receiver").
fn make_proxy(lua: &Lua, receiver: Arc<dyn HostObject>, method: String, bridge: Arc<Bridge>) -> mlua::Result<mlua::Function> {
    lua.create_function(move |lua, args: mlua::Variadic<Value>| {
        let mut call_args = Vec::new();
        for v in args.into_iter().skip(1) {
            call_args.push(lua_to_attr(&v).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?);
        }
        let result = bridge
            .call_blocking(receiver.clone(), method.clone(), call_args)
            .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
        attr_to_lua(lua, result, bridge.clone())
    })
}

/// Adapts `habctl_domain::device::DeviceManager` to the sandbox boundary.
pub struct DeviceManagerHost(pub Arc<dyn DeviceManager>);

impl HostObject for DeviceManagerHost {
    fn get_attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "device" => Some(AttrValue::BoundMethod {
                receiver: Arc::new(DeviceManagerHost(self.0.clone())),
                method: "device".to_string(),
            }),
            _ => None,
        }
    }

    fn set_attr(&self, name: &str, _value: AttrValue) -> Result<()> {
        Err(Error::AttributeTypeNotAllowed(name.to_string()))
    }

    fn call_method(&self, name: &str, args: Vec<AttrValue>) -> Result<AttrValue> {
        match name {
            "device" => {
                let Some(AttrValue::Str(id)) = args.into_iter().next() else {
                    return Ok(AttrValue::Nil);
                };
                Ok(match self.0.device(&id) {
                    Some(dev) => AttrValue::Object(Arc::new(DeviceHost(dev))),
                    None => AttrValue::Nil,
                })
            }
            _ => Err(Error::AttributeNotFound(name.to_string())),
        }
    }
}

/// Adapts `habctl_domain::device::Device` to the sandbox boundary.
pub struct DeviceHost(pub Arc<dyn Device>);

impl HostObject for DeviceHost {
    fn get_attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "sensorValue" => Some(AttrValue::BoundMethod {
                receiver: Arc::new(DeviceHost(self.0.clone())),
                method: "sensorValue".to_string(),
            }),
            _ => None,
        }
    }

    fn set_attr(&self, name: &str, _value: AttrValue) -> Result<()> {
        Err(Error::AttributeTypeNotAllowed(name.to_string()))
    }

    fn call_method(&self, name: &str, args: Vec<AttrValue>) -> Result<AttrValue> {
        match name {
            "sensorValue" => {
                let mut it = args.into_iter();
                let (Some(AttrValue::Str(sensor_type)), Some(AttrValue::Str(scale))) = (it.next(), it.next()) else {
                    return Ok(AttrValue::Nil);
                };
                let sensor_type = match sensor_type.as_str() {
                    "temperature" => SensorType::Temperature,
                    _ => return Ok(AttrValue::Nil),
                };
                let scale = match scale.as_str() {
                    "celsius" => Scale::Celsius,
                    _ => return Ok(AttrValue::Nil),
                };
                Ok(self
                    .0
                    .sensor_value(sensor_type, scale)
                    .map(AttrValue::Float)
                    .unwrap_or(AttrValue::Nil))
            }
            _ => Err(Error::AttributeNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habctl_domain::device::{Device, DeviceManager};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullQueue;
    impl MainThreadQueue for NullQueue {
        fn submit(&self, job: Box<dyn FnOnce() + Send>) {
            job();
        }
    }

    struct StubDevice;
    impl Device for StubDevice {
        fn sensor_value(&self, _t: SensorType, _s: Scale) -> Option<f64> {
            Some(21.5)
        }
    }

    struct StubDevices(Arc<StubDevice>);
    impl DeviceManager for StubDevices {
        fn device(&self, id: &str) -> Option<Arc<dyn Device>> {
            (id == "42").then(|| self.0.clone() as Arc<dyn Device>)
        }
    }

    #[test]
    fn bridge_call_blocking_runs_synchronously() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        struct CountingQueue(Arc<AtomicUsize>);
        impl MainThreadQueue for CountingQueue {
            fn submit(&self, job: Box<dyn FnOnce() + Send>) {
                self.0.fetch_add(1, Ordering::SeqCst);
                job();
            }
        }
        let bridge = Bridge::new(Arc::new(CountingQueue(calls2)), Duration::from_secs(1));
        let manager: Arc<dyn HostObject> = Arc::new(DeviceManagerHost(Arc::new(StubDevices(Arc::new(StubDevice)))));
        let result = bridge.call_blocking(manager, "device".into(), vec![AttrValue::Str("42".into())]).unwrap();
        assert!(matches!(result, AttrValue::Object(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_manager_unknown_id_yields_nil() {
        let manager = DeviceManagerHost(Arc::new(StubDevices(Arc::new(StubDevice))));
        let result = manager.call_method("device", vec![AttrValue::Str("99".into())]).unwrap();
        assert!(matches!(result, AttrValue::Nil));
    }

    #[test]
    fn device_sensor_value_round_trips_through_lua() {
        let lua = Lua::new();
        let bridge = Bridge::new(Arc::new(NullQueue), Duration::from_secs(1));
        let device: Arc<dyn HostObject> = Arc::new(DeviceHost(Arc::new(StubDevice)));
        let handle = HostHandle::new(device, bridge);
        lua.globals().set("dev", handle).unwrap();
        let value: f64 = lua
            .load(r#"return dev:sensorValue("temperature", "celsius")"#)
            .eval()
            .unwrap();
        assert_eq!(value, 21.5);
    }
}
