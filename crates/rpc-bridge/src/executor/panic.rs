// Handler panic capture
//
// A process-wide panic hook records a backtrace at the panic site, but only while
// a handler future is being polled. The handler task reads it back on the same
// thread right after `catch_unwind` returns.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::{Future, poll_fn};
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use crate::error::RpcError;

thread_local! {
	static POLLING_HANDLER: Cell<usize> = const { Cell::new(0) };
	static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
	INSTALL_HOOK.call_once(|| {
		let previous = std::panic::take_hook();
		std::panic::set_hook(Box::new(move |info| {
			if POLLING_HANDLER.with(Cell::get) > 0 {
				let stack = Backtrace::force_capture().to_string();
				PANIC_STACK.with(|s| *s.borrow_mut() = Some(stack));
			}
			previous(info);
		}));
	});
}

/// Marks the current thread as polling a handler until dropped, unwinding included.
struct PollingHandler;

impl PollingHandler {
	fn enter() -> Self {
		POLLING_HANDLER.with(|d| d.set(d.get() + 1));
		PollingHandler
	}
}

impl Drop for PollingHandler {
	fn drop(&mut self) {
		POLLING_HANDLER.with(|d| d.set(d.get().saturating_sub(1)));
	}
}

fn take_stack() -> Option<String> {
	PANIC_STACK.with(|s| s.borrow_mut().take())
}

/// A recovered handler panic.
#[derive(Debug)]
pub(super) struct HandlerPanic {
	pub message: String,
	pub stack: Option<String>,
}

impl HandlerPanic {
	pub fn into_error(self) -> RpcError {
		let mut data = json!({ "panic": self.message });
		if let Some(stack) = self.stack {
			data["stack"] = Value::String(stack);
		}
		RpcError::internal(format!("Internal error: panic: {}", self.message)).with_data(data)
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

/// Drive `fut` to completion, turning a panic into a [`HandlerPanic`] that
/// carries the backtrace taken where the panic happened.
pub(super) async fn catch_panic<T>(mut fut: BoxFuture<'static, T>) -> Result<T, HandlerPanic> {
	install_hook();
	let watched = poll_fn(move |cx| {
		let _polling = PollingHandler::enter();
		fut.as_mut().poll(cx)
	});
	match AssertUnwindSafe(watched).catch_unwind().await {
		Ok(value) => {
			take_stack();
			Ok(value)
		},
		Err(payload) => Err(HandlerPanic {
			message: panic_message(payload.as_ref()),
			stack: take_stack(),
		}),
	}
}
