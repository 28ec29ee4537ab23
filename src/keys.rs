//! Key Builder Module
//!
//! Deterministic key construction for cached responses and memoized calls.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use axum::http::Method;
use sha2::{Digest, Sha256};

/// Paths longer than this are replaced by their digest in response keys.
pub const MAX_INLINE_PATH: usize = 128;

const SEPARATOR: char = '|';

// == Response Keys ==
/// Builds the key of a cached response: `"{METHOD}:{path}"`.
///
/// The query string is ignored, so `/a?x=1` and `/a?x=2` share a key. A
/// trailing slash is ignored too. Long paths are hashed to keep keys within
/// backend limits.
pub fn response_key(method: &Method, path: &str) -> String {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    let path = match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    };

    if path.len() > MAX_INLINE_PATH {
        format!("{}:#{}", method.as_str(), hex::encode(Sha256::digest(path.as_bytes())))
    } else {
        format!("{}:{}", method.as_str(), path)
    }
}

// == Callable Identity ==
/// Identifies a memoized computation.
///
/// `name` should be module-qualified (e.g. `module_path!()` plus the function
/// name). Methods carry the identity of their receiver, taken from its
/// address, so distinct instances never share entries and the key is only
/// meaningful within one process run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableId {
    name: Cow<'static, str>,
    receiver: Option<String>,
}

impl CallableId {
    /// A free function or associated function.
    pub fn function(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            receiver: None,
        }
    }

    /// A method bound to `receiver`.
    pub fn method<T: ?Sized>(name: impl Into<Cow<'static, str>>, receiver: &T) -> Self {
        Self {
            name: name.into(),
            receiver: Some(format!("{:p}", receiver as *const T as *const ())),
        }
    }

    /// A method bound to a receiver with an explicit, caller-chosen identity
    /// (for example a database id), stable across processes.
    pub fn method_with_id(name: impl Into<Cow<'static, str>>, receiver_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: Some(receiver_id.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    /// The same callable without its receiver.
    pub fn unbound(&self) -> Self {
        Self::function(self.name.clone())
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.receiver {
            Some(receiver) => write!(f, "{}@{}", self.name, receiver),
            None => f.write_str(&self.name),
        }
    }
}

// == Memoize Arguments ==
/// Textual representation of a call's arguments.
///
/// Arguments are rendered with their `Debug` implementation. Types whose
/// `Debug` output is not determined by their content will miss the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoArgs {
    positional: Vec<String>,
    keyword: BTreeMap<String, String>,
}

impl MemoArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Debug + ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(format!("{:?}", value));
        self
    }

    /// Sets a keyword argument. Keyword order never affects the key.
    pub fn kwarg<T: Debug + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.keyword.insert(name.into(), format!("{:?}", value));
        self
    }
}

// == Memoize Keys ==
/// Builds the key of a memoized call: `"{name}:{sha256 of the canonical call}"`.
///
/// The canonical form tags every component (`f=`, `r=`, `a=`, `k=`), escapes
/// `\`, `|` and `=` inside it, and joins the components with `|`, so no two
/// distinct calls share a canonical form.
pub fn memoize_key(callable: &CallableId, args: &MemoArgs) -> String {
    let canonical = canonical_call(callable, args);
    let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
    format!("{}:{}", escape(callable.name()), &digest[..32])
}

fn canonical_call(callable: &CallableId, args: &MemoArgs) -> String {
    let mut parts = vec![format!("f={}", escape(callable.name()))];
    if let Some(receiver) = callable.receiver() {
        parts.push(format!("r={}", escape(receiver)));
    }
    parts.extend(args.positional.iter().map(|arg| format!("a={}", escape(arg))));
    parts.extend(
        args.keyword
            .iter()
            .map(|(name, value)| format!("k={}={}", escape(name), escape(value))),
    );
    parts.join(&SEPARATOR.to_string())
}

fn escape(component: &str) -> Cow<'_, str> {
    if !component.contains(['\\', SEPARATOR, '=']) {
        return Cow::Borrowed(component);
    }
    let mut escaped = String::with_capacity(component.len() + 4);
    for c in component.chars() {
        if matches!(c, '\\' | SEPARATOR | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_key_depends_on_method_and_path() {
        assert_eq!(response_key(&Method::GET, "/a"), response_key(&Method::GET, "/a"));
        assert_ne!(response_key(&Method::GET, "/a"), response_key(&Method::GET, "/b"));
        assert_ne!(response_key(&Method::GET, "/a"), response_key(&Method::POST, "/a"));
        assert_eq!(response_key(&Method::GET, "/a"), "GET:/a");
    }

    #[test]
    fn test_response_key_ignores_query_string() {
        assert_eq!(
            response_key(&Method::GET, "/a?x=1"),
            response_key(&Method::GET, "/a?x=2")
        );
    }

    #[test]
    fn test_response_key_ignores_trailing_slash() {
        assert_eq!(response_key(&Method::GET, "/things/"), "GET:/things");
        assert_eq!(response_key(&Method::GET, "/"), "GET:/");
    }

    #[test]
    fn test_long_paths_are_hashed() {
        let long = format!("/{}", "x".repeat(MAX_INLINE_PATH + 10));
        let key = response_key(&Method::GET, &long);

        assert!(key.starts_with("GET:#"));
        assert_eq!(key.len(), "GET:#".len() + 64);
        assert_ne!(key, response_key(&Method::GET, &format!("{}y", long)));
    }

    #[test]
    fn test_memoize_key_positional_order_matters() {
        let f = CallableId::function("demo::add");
        let forward = memoize_key(&f, &MemoArgs::new().arg(&1).arg(&2));
        let reverse = memoize_key(&f, &MemoArgs::new().arg(&2).arg(&1));
        assert_ne!(forward, reverse);
    }

    #[test]
    fn test_memoize_key_keyword_order_does_not_matter() {
        let f = CallableId::function("demo::add");
        let ab = memoize_key(&f, &MemoArgs::new().kwarg("a", &1).kwarg("b", &2));
        let ba = memoize_key(&f, &MemoArgs::new().kwarg("b", &2).kwarg("a", &1));
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_memoize_key_is_stable_and_namespaced() {
        let f = CallableId::function("demo::square");
        let first = memoize_key(&f, &MemoArgs::new().arg(&5));
        let second = memoize_key(&f, &MemoArgs::new().arg(&5));

        assert_eq!(first, second);
        assert!(first.starts_with("demo::square:"));
        assert_ne!(first, memoize_key(&CallableId::function("demo::cube"), &MemoArgs::new().arg(&5)));
    }

    #[test]
    fn test_separator_inside_arguments_is_unambiguous() {
        let f = CallableId::function("demo::join");
        let one = memoize_key(&f, &MemoArgs::new().arg("a|a=b"));
        let two = memoize_key(&f, &MemoArgs::new().arg("a").arg("b"));
        assert_ne!(one, two);

        let kw = memoize_key(&f, &MemoArgs::new().kwarg("a=1", &2));
        let kw2 = memoize_key(&f, &MemoArgs::new().kwarg("a", &"1=2"));
        assert_ne!(kw, kw2);
    }

    #[test]
    fn test_positional_and_keyword_do_not_collide() {
        let f = CallableId::function("demo::f");
        let positional = memoize_key(&f, &MemoArgs::new().arg(&1));
        let keyword = memoize_key(&f, &MemoArgs::new().kwarg("a", &1));
        assert_ne!(positional, keyword);
    }

    #[test]
    fn test_method_receivers_are_distinguished() {
        struct Adder(#[allow(dead_code)] u8);
        let first = Adder(1);
        let second = Adder(2);

        let args = MemoArgs::new().arg(&3);
        let a = memoize_key(&CallableId::method("demo::Adder::add", &first), &args);
        let b = memoize_key(&CallableId::method("demo::Adder::add", &second), &args);
        let a_again = memoize_key(&CallableId::method("demo::Adder::add", &first), &args);

        assert_eq!(a, a_again);
        assert_ne!(a, b);

        let x = memoize_key(&CallableId::method_with_id("demo::Adder::add", "1"), &args);
        let y = memoize_key(&CallableId::method_with_id("demo::Adder::add", "2"), &args);
        assert_ne!(x, y);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape(r"a|b=c\d"), r"a\|b\=c\\d");
    }
}
