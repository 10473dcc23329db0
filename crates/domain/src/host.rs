//! Cross-thread attribute bridge contract (C8). Host objects (devices,
//! device lists, the device manager itself) implement [`HostObject`]; the
//! script-host crate's bridge is the only thing that ever calls across
//! this trait from the worker thread, and it only does so by submitting a
//! job to a [`crate::queue::MainThreadQueue`] — the trait methods
//! themselves are expected to run on the main loop.

use std::sync::Arc;

use crate::error::{Error, Result};

/// A value crossing the host/sandbox boundary. Variants beyond the
/// primitives are only legal along specific paths (see [`HostObject`]'s
/// method docs) — a getter that returns [`AttrValue::Object`] outside of
/// [`HostObject::index`] must be rejected by the caller as
/// attribute-type-not-allowed, per the bridge's getter contract.
#[derive(Clone)]
pub enum AttrValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An attribute that is a method on `receiver`, to be invoked with the
    /// `obj:method()` colon-call convention (receiver passed explicitly,
    /// never implicitly rebound).
    BoundMethod {
        receiver: Arc<dyn HostObject>,
        method: String,
    },
    /// A nested host object, legal only as the result of sequence
    /// indexing (`obj[1]`), never as a plain attribute.
    Object(Arc<dyn HostObject>),
}

/// A host-side value reachable from sandboxed scripts only through this
/// trait and only ever invoked on the main loop.
pub trait HostObject: Send + Sync {
    /// `obj.attr` — `None` means "no such attribute", mapped by the
    /// bridge to attribute-not-found.
    fn get_attr(&self, name: &str) -> Option<AttrValue>;

    /// `obj.attr = value` — fire-and-forget from the guest's perspective.
    fn set_attr(&self, name: &str, value: AttrValue) -> Result<()>;

    /// Invoke a bound method by name with already-marshaled arguments.
    fn call_method(&self, name: &str, args: Vec<AttrValue>) -> Result<AttrValue>;

    /// `obj[i]` for 1-based sequence access. `None` denotes out of range.
    fn index(&self, i: i64) -> Option<AttrValue> {
        let _ = i;
        None
    }
}

/// Narrow an [`AttrValue`] down to the primitives the bridge's plain
/// getter path (non-index, non-method) is allowed to hand back verbatim.
pub fn reject_bare_object(value: AttrValue, attr: &str) -> Result<AttrValue> {
    match value {
        AttrValue::Object(_) => Err(Error::AttributeTypeNotAllowed(attr.to_string())),
        other => Ok(other),
    }
}
