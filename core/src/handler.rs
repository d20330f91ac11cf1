use crate::handle::Handle;
use crate::props::Props;
use crate::state::State;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// What a handler returns once its work is done.
///
/// The continuation is not the return value: it is the signal emitted on
/// the `Handle`. Returning `Err` reports an unexpected failure; the engine
/// answers with a generic error and never leaks the message.
pub type HandlerResult = anyhow::Result<()>;

/// The contract for one step of a flow.
///
/// A handler receives the `Handle` to signal on, the caller's read-only
/// `Props` and the per-step `State` view. It must emit at most one signal;
/// returning without one is treated as an implicit `next()`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, h: Handle, props: Props, state: State) -> HandlerResult;

    /// Label used in logs. Defaults to the type name.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

pub type SharedHandler = Arc<dyn Handler>;

/// Adapter turning an async function or closure into a `Handler`.
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
    name: &'static str,
}

/// Wrap an async function as a handler.
///
/// ```rust,ignore
/// async fn greet(h: Handle, props: Props, _state: State) -> HandlerResult {
///     h.end(json!({ "hello": props.get_str("name") }));
///     Ok(())
/// }
///
/// let flow = Flow::new().then(handler_fn(greet));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Handle, Props, State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFn {
        f,
        name: short_type_name::<F>(),
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Handle, Props, State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, h: Handle, props: Props, state: State) -> HandlerResult {
        (self.f)(h, props, state).await
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Readable name of a type, e.g. "record_name" from "phone::record_name".
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
