//! §4.4 step 5 sandboxing: purge every global not on the whitelist, and
//! every member of a whitelisted table not listed.
//!
//! The host's own bindings (`print`, `suspend`, `deviceManager`, the guest
//! `sleep` wrapper, and the `list` helper) are installed around this purge
//! per §4.4's numbered steps, which place the purge (step 5) *after* those
//! bindings (steps 2-4). Taken completely literally that would delete the
//! very bindings the script needs, since none of them are stdlib surface
//! and so none appear in the whitelist table itself. [`HOST_GLOBALS`]
//! is therefore treated as an always-retained extension of the whitelist
//! rather than subject to the purge.

use mlua::{Lua, Result as LuaResult, Value};

/// Names installed by the host itself, exempt from the whitelist purge.
pub const HOST_GLOBALS: &[&str] = &["print", "suspend", "sleep", "deviceManager", "list"];

fn table_whitelist(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "coroutine" => Some(&["create", "resume", "running", "status", "wrap", "yield"]),
        "math" => Some(&[
            "abs", "acos", "asin", "atan", "atan2", "ceil", "cos", "cosh", "deg", "exp", "floor",
            "fmod", "frexp", "huge", "ldexp", "log", "log10", "max", "min", "modf", "pi", "pow",
            "rad", "random", "randomseed", "sin", "sinh", "sqrt", "tan", "tanh",
        ]),
        "os" => Some(&["clock", "date", "difftime", "time"]),
        "string" => Some(&[
            "byte", "char", "find", "format", "gmatch", "gsub", "len", "lower", "match", "rep",
            "reverse", "sub", "upper",
        ]),
        "table" => Some(&["concat", "insert", "maxn", "remove", "sort"]),
        _ => None,
    }
}

fn is_whitelisted_leaf(name: &str) -> bool {
    matches!(
        name,
        "_VERSION"
            | "assert"
            | "error"
            | "ipairs"
            | "next"
            | "pairs"
            | "pcall"
            | "print"
            | "select"
            | "tonumber"
            | "tostring"
            | "type"
            | "unpack"
            | "xpcall"
    )
}

/// Purge globals down to the whitelist (plus [`HOST_GLOBALS`]) and install
/// the `list.new`/`list.slice` helper table.
pub fn sandbox(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();

    let mut names = Vec::new();
    for pair in globals.pairs::<String, Value>() {
        let (name, _) = pair?;
        names.push(name);
    }

    for name in names {
        if name == "_G" || HOST_GLOBALS.contains(&name.as_str()) {
            continue;
        }
        if is_whitelisted_leaf(&name) {
            continue;
        }
        match table_whitelist(&name) {
            Some(allowed) => {
                if let Value::Table(t) = globals.get::<_, Value>(name.as_str())? {
                    let mut field_names = Vec::new();
                    for pair in t.clone().pairs::<String, Value>() {
                        let (k, _) = pair?;
                        field_names.push(k);
                    }
                    for k in field_names {
                        if !allowed.contains(&k.as_str()) {
                            t.set(k.as_str(), Value::Nil)?;
                        }
                    }
                }
            }
            None => {
                globals.set(name.as_str(), Value::Nil)?;
            }
        }
    }

    install_list_helper(lua)
}

fn install_list_helper(lua: &Lua) -> LuaResult<()> {
    let list = lua.create_table()?;

    list.set(
        "new",
        lua.create_function(|lua, args: mlua::Variadic<Value>| {
            let t = lua.create_table()?;
            for (i, v) in args.into_iter().enumerate() {
                t.set(i + 1, v)?;
            }
            Ok(t)
        })?,
    )?;

    list.set(
        "slice",
        lua.create_function(
            |lua, (seq, start, end, step): (mlua::Table, Option<i64>, Option<i64>, Option<i64>)| {
                let len = seq.raw_len() as i64;
                let step = step.unwrap_or(1);
                if step == 0 {
                    return Err(mlua::Error::RuntimeError("list.slice: step must not be 0".into()));
                }
                let start = start.unwrap_or(1);
                let end = end.unwrap_or(len);
                let out = lua.create_table()?;
                let mut idx = start;
                let mut out_i = 1i64;
                while (step > 0 && idx <= end) || (step < 0 && idx >= end) {
                    if idx >= 1 && idx <= len {
                        let v: Value = seq.get(idx)?;
                        out.set(out_i, v)?;
                        out_i += 1;
                    }
                    idx += step;
                }
                Ok(out)
            },
        )?,
    )?;

    lua.globals().set("list", list)
}
