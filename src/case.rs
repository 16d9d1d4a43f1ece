//! Identifier case conversion between snake_case, camelCase and PascalCase.
//!
//! Every conversion is memoized: the same input always yields the very same
//! `Arc<str>`, so derived names can be compared by pointer and shared as map
//! keys without re-allocating.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

/// A memoized string transform.
pub struct Memo {
    transform: fn(&str) -> String,
    cache: Mutex<HashMap<String, Arc<str>>>,
    computed: AtomicUsize,
}

impl Memo {
    pub fn new(transform: fn(&str) -> String) -> Self {
        Self {
            transform,
            cache: Mutex::new(HashMap::new()),
            computed: AtomicUsize::new(0),
        }
    }

    /// Return the cached conversion of `input`, computing it on first use.
    pub fn get(&self, input: &str) -> Arc<str> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(input) {
            return Arc::clone(hit);
        }

        self.computed.fetch_add(1, Ordering::Relaxed);
        let converted: Arc<str> = Arc::from((self.transform)(input));
        cache.insert(input.to_string(), Arc::clone(&converted));
        converted
    }

    /// Number of times the underlying transform actually ran.
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}

static CAMEL: LazyLock<Memo> = LazyLock::new(|| Memo::new(camel_case));
static SNAKE: LazyLock<Memo> = LazyLock::new(|| Memo::new(snake_case));
static PASCAL: LazyLock<Memo> = LazyLock::new(|| Memo::new(pascal_case));

/// `team_member_id` -> `teamMemberId`
pub fn to_camel(identifier: &str) -> Arc<str> {
    CAMEL.get(identifier)
}

/// `TeamMember` / `teamMember` -> `team_member`
pub fn to_snake(identifier: &str) -> Arc<str> {
    SNAKE.get(identifier)
}

/// `team_member` -> `TeamMember`
pub fn to_pascal(identifier: &str) -> Arc<str> {
    PASCAL.get(identifier)
}

/// Rename every key of a record to snake_case.
pub fn keys_to_snake(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .map(|(k, v)| (to_snake(k).to_string(), v.clone()))
        .collect()
}

/// Rename every key of a record to camelCase.
pub fn keys_to_camel(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .map(|(k, v)| (to_camel(k).to_string(), v.clone()))
        .collect()
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut chars = snake.chars().peekable();

    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '_' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }

    out
}

fn snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    let mut chars = camel.chars();

    if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
    }
    for c in chars {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

fn pascal_case(snake: &str) -> String {
    let camel = camel_case(snake);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => camel,
    }
}
