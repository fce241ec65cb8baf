//! Cooperative cancellation for a single pipeline run.
//!
//! A run is cancelled when the client side of the event stream goes away.
//! Stages poll or await the token and abandon their remaining work.

mod token;

pub use token::CancellationToken;
