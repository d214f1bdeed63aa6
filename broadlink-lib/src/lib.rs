pub mod checksum;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod device;
pub mod devicename;
pub mod discovery;
pub mod error;
pub mod packet;
pub mod remote;
pub mod transport;
pub mod wifi;

// Re-export the main types for easy access
pub use cipher::CipherKey;
pub use config::{DeviceConfig, DiscoveryConfig};
pub use device::Device;
pub use devicename::DeviceModel;
pub use discovery::{discover_all, discover_from};
pub use error::{BroadlinkError, Result};
pub use remote::RemoteType;
pub use wifi::{WifiSecurity, setup_wifi};
