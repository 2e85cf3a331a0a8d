//! The playback daemon: one [`tuplet_engine::LocalEngine`] served over a
//! Unix socket, one request per connection.

mod socket;

pub use socket::{bind, serve};
