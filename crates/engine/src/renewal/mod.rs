//! Cache renewal.
//!
//! - [`Refresher`] runs single cycles (provider, full region, spot prices)
//!   and records their outcome on the cache and the event sink.
//! - [`RenewalScheduler`] drives refreshers on two cadences.
//! - [`InFlight`] keeps cycles of the same key from overlapping.

mod guard;
mod refresher;
mod scheduler;

pub use guard::{InFlight, InFlightGuard};
pub use refresher::Refresher;
pub use scheduler::{renew_provider, renew_spot_prices, RenewalScheduler, SchedulerHandle};
