//! Refresh events.
//!
//! Every renewal cycle reports its outcome, and every observed spot price,
//! through a [`RefreshEventSink`]. The daemon logs them; tests collect them.

mod refresh_event;
mod sink;

pub use refresh_event::*;
pub use sink::*;
