//! Client-side cart: serialized mutations against the remote Store API,
//! optimistic local state, and reconciliation.

pub mod queue;
pub mod session;
pub mod state;

pub use queue::OperationQueue;
pub use session::{CartError, CartIdentity, CartSession};
pub use state::{CartAction, CartState, LoadingStates};
