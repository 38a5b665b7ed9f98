//! FT232R backend: drives the programming boards' USB bridge in synchronous
//! bit-bang mode through libftdi.

mod device;
mod error;

pub use device::{Ft232r, MAX_TRANSFER_SIZE, PRODUCT_ID, VENDOR_ID};
pub use error::FtdiBridgeError;
