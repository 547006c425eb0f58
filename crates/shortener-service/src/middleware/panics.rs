//! Panic containment.

use crate::errors::WebError;
use crate::web::{handler_fn, middleware_fn, Handler, Middleware};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Run the inner handler inside an unwind boundary.
///
/// A panic becomes `WebError::PanicRecovered` carrying the panic message and
/// a backtrace captured where the panic was caught, so the outer stages see
/// an ordinary error.
pub fn panics() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |scope, req| {
            let next = Arc::clone(&next);
            async move {
                // the call itself sits inside the future so a panic while
                // building it is caught too
                let guarded = AssertUnwindSafe(async move { next(scope, req).await });
                match guarded.catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        tracing::error!(target: "shortener.web.panics", message = %message, "Handler panicked");
                        Err(WebError::PanicRecovered {
                            message,
                            trace: Backtrace::force_capture().to_string(),
                        })
                    }
                }
            }
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
