//! Flow - Ordered Handler Chains
//!
//! A `Flow` is an anonymous chain that can be composed into others (used
//! for middleware). A `NamedFlow` is what gets registered in the table and
//! addressed by callers.

use crate::handler::{Handler, SharedHandler};
use std::sync::Arc;

/// Ordered sequence of handlers.
#[derive(Clone, Default)]
pub struct Flow {
    chain: Vec<SharedHandler>,
}

/// Anything that can be spliced into a flow: one handler or a whole flow.
pub trait IntoChain {
    fn into_chain(self) -> Vec<SharedHandler>;
}

impl<H: Handler> IntoChain for H {
    fn into_chain(self) -> Vec<SharedHandler> {
        vec![Arc::new(self)]
    }
}

impl IntoChain for Flow {
    fn into_chain(self) -> Vec<SharedHandler> {
        self.chain
    }
}

impl IntoChain for &Flow {
    fn into_chain(self) -> Vec<SharedHandler> {
        self.chain.clone()
    }
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler or a flow.
    pub fn then(mut self, step: impl IntoChain) -> Self {
        self.chain.extend(step.into_chain());
        self
    }

    /// Prepend a handler or a flow.
    pub fn pre(mut self, step: impl IntoChain) -> Self {
        let mut chain = step.into_chain();
        chain.append(&mut self.chain);
        self.chain = chain;
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn handlers(&self) -> &[SharedHandler] {
        &self.chain
    }

    /// Give this flow an external name so it can be registered.
    pub fn named(self, name: impl Into<String>) -> NamedFlow {
        NamedFlow {
            name: name.into(),
            flow: self,
        }
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.chain.iter().map(|h| h.name()))
            .finish()
    }
}

/// A flow addressable by callers through its name.
#[derive(Clone, Debug)]
pub struct NamedFlow {
    name: String,
    flow: Flow,
}

impl NamedFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Flow::new().named(name)
    }

    pub fn then(mut self, step: impl IntoChain) -> Self {
        self.flow = self.flow.then(step);
        self
    }

    pub fn pre(mut self, step: impl IntoChain) -> Self {
        self.flow = self.flow.pre(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn into_parts(self) -> (String, Flow) {
        (self.name, self.flow)
    }
}
