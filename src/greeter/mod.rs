//! Demo stateful-object facility
//!
//! A tiny namespace of named, long-lived objects exposing one greeting
//! method. The gateway's fallback route talks to it the way the rest of the
//! handlers talk to the object store: through a handle resolved by name, so
//! the implementation can be swapped without touching routing. It is wired
//! into [`crate::config::AppState`] at startup and shares nothing with the
//! storage core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// The one method a greeter object exposes.
#[async_trait]
pub trait Greeter: Send + Sync {
    async fn say_hello(&self, name: &str) -> String;
}

/// Built-in greeter producing the classic greeting.
pub struct HelloGreeter;

#[async_trait]
impl Greeter for HelloGreeter {
    async fn say_hello(&self, name: &str) -> String {
        format!("Hello, {name}!")
    }
}

/// Produces a greeter instance the first time a name is resolved.
pub type GreeterFactory = dyn Fn(&str) -> Arc<dyn Greeter> + Send + Sync;

/// Namespace of named greeter objects.
///
/// `get_by_name` hands back the same instance for the same name for the life
/// of the process, so object state (and identity) outlives any one request.
pub struct GreeterNamespace {
    objects: Mutex<HashMap<String, Arc<dyn Greeter>>>,
    factory: Box<GreeterFactory>,
}

impl GreeterNamespace {
    /// Namespace producing the built-in greeter.
    pub fn hello() -> Self {
        Self::with_factory(Box::new(|_name| Arc::new(HelloGreeter)))
    }

    /// Namespace with a custom object factory.
    #[allow(dead_code)]
    pub fn with_factory(factory: Box<GreeterFactory>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            factory,
        }
    }

    /// Resolve the object registered under `name`, creating it on first use.
    pub fn get_by_name(&self, name: &str) -> Arc<dyn Greeter> {
        let mut objects = self.objects.lock().unwrap();
        objects
            .entry(name.to_string())
            .or_insert_with(|| (self.factory)(name))
            .clone()
    }
}
