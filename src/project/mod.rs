pub mod addresses;
pub mod bootstrap;
pub mod setup;

pub use addresses::{resolve as resolve_tracker_addresses, TrackerAddresses};
pub use bootstrap::BootstrapSpec;
pub use setup::ProjectBuilder;
