//! Conversation flow: client state, chat turns and background refreshes

mod controller;
mod poller;
mod state;

#[cfg(test)]
mod testing;

pub use controller::*;
pub use poller::*;
pub use state::*;
