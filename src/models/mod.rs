pub mod port;
pub mod shipment;
pub mod weather;

pub use port::*;
pub use shipment::*;
pub use weather::*;
