mod device_desc;
mod source_config;

pub use device_desc::DeviceDesc;
pub use source_config::{Cone, SourceConfig};
