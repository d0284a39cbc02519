//! Identifier newtypes and the optimistic version counter shared by every
//! crate in the payment workspace.

mod types;
mod version;

pub use types::{EventId, OrderId, PaymentId, UserId};
pub use version::Version;
