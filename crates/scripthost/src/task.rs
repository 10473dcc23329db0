use mlua::{Lua, RegistryKey, Result as LuaResult, Value};

/// A lifetime-free stand-in for `mlua::Value`, so a signal's arguments can
/// sit in a queue (and cross the timer-thread boundary) without touching a
/// `Lua`-bound type. Only the primitives the bridge itself ever marshals
/// need representing here.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScriptArg {
    pub fn into_lua(self, lua: &Lua) -> LuaResult<Value> {
        Ok(match self {
            ScriptArg::Nil => Value::Nil,
            ScriptArg::Bool(b) => Value::Boolean(b),
            ScriptArg::Int(i) => Value::Integer(i),
            ScriptArg::Float(f) => Value::Number(f),
            ScriptArg::Str(s) => Value::String(lua.create_string(&s)?),
        })
    }
}

/// A unit of work for a script's worker thread. `Signal` starts a fresh
/// routine by top-level function name; `Resume` re-enters a routine parked
/// by a prior `suspend(ms)` call — dispatch discriminates on this enum's
/// variant, never by inspecting a name string, so a resumed routine can
/// never be confused with a fresh signal call that happens to share a name.
pub enum Task {
    Signal(String, Vec<ScriptArg>),
    Resume(RegistryKey),
}
