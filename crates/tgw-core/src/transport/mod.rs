pub mod paced;
pub mod port;

pub use paced::{PacedSender, PacingConfig};
pub use port::{TransportCapabilities, TransportSender};
