//! Outbound delivery to the messaging platform.

pub mod messenger;
pub mod traits;

pub use messenger::MessengerChannel;
pub use traits::{Channel, SendMessage};
