//! # sheepevents - fire-and-forget signals
//!
//! A [`Notifier`] is one named signal channel with any number of async
//! handlers. Components expose their signals as plain `Notifier` fields:
//!
//! ```no_run
//! use sheepevents::Notifier;
//!
//! #[derive(Clone, Debug)]
//! struct Egged {
//!     amount: u32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let egged = Notifier::<Egged>::new("egged");
//! egged.subscribe(|event: Egged| async move {
//!     tracing::info!("I got egged: {}", event.amount);
//!     Ok(())
//! });
//! egged.publish(Egged { amount: 5 });
//! # }
//! ```
//!
//! ## Delivery rules
//!
//! - [`Notifier::publish`] never waits for a handler. It only enqueues the
//!   payload for every subscriber.
//! - Every subscriber owns a delivery task. Each invocation runs in its own
//!   spawned task, so an error or a panic is logged and contained.
//! - A subscriber sees publishes in the order they were issued. Different
//!   subscribers run concurrently and in no particular order.
//! - A notifier built with [`Notifier::with_parent`] forwards every publish
//!   to its parent, which is how a signal shared by several components is
//!   composed.
//!
//! Subscribing spawns the delivery task, so it must happen inside a Tokio
//! runtime. Publishing has no such requirement.

pub mod notifier;

pub use notifier::{HandlerFuture, Notifier, SubscriptionId};
