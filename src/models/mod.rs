pub mod alert;
pub mod asset;
pub mod price;

pub use alert::{Alert, AlertDirection, AlertStatus};
pub use asset::{Asset, UnsupportedAsset};
pub use price::{PriceSnapshot, TriggeredMatch};
