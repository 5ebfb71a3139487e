//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! An [`Endpoint`](crate::Endpoint) holds handlers of *different* types in a
//! single `HashMap<String, BoxedHandler>`, and an [`Action`](crate::Action)
//! does the same per verb. Rust collections can only hold one concrete type,
//! so every handler is hidden behind a trait object (`dyn ErasedHandler`).
//!
//! ```text
//! fn hello(req: &Request, ov: &mut Overhead) -> Response { … }  ← user writes this
//!        ↓ Action::new().get(hello)
//! hello.into_boxed_handler()                                   ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                                   ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(&req, &mut ov)  at request time                 ← one vtable dispatch
//! ```
//!
//! Composites ([`Action`](crate::Action), [`Pipeline`](crate::Pipeline),
//! [`Cors`](crate::Cors)) are handlers too, which is what lets guards wrap
//! either dispatch layer.
//!
//! Handlers are synchronous: the whole extract → validate → dispatch chain
//! runs to completion on the caller's thread.

use std::sync::Arc;

use crate::context::Overhead;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid request handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature:
///
/// ```text
/// fn name(req: &Request, overhead: &mut Overhead) -> impl IntoResponse
/// ```
///
/// and by menhir's composites. The trait is **sealed**: only this crate can
/// add implementations.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, R> private::Sealed for F
where
    F: Fn(&Request, &mut Overhead) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
}

impl<F, R> Handler for F
where
    F: Fn(&Request, &mut Overhead) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype bridging a plain function to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&Request, &mut Overhead) -> R,
    R: IntoResponse,
{
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        Ok((self.0)(req, overhead).into_response())
    }
}

/// Implements [`Handler`] for a composite that already implements
/// [`ErasedHandler`].
macro_rules! composite_handler {
    ($ty:ty) => {
        impl $crate::handler::private::Sealed for $ty {}

        impl $crate::handler::Handler for $ty {
            fn into_boxed_handler(self) -> $crate::handler::BoxedHandler {
                ::std::sync::Arc::new(self)
            }
        }
    };
}

pub(crate) use composite_handler;
