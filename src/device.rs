//! Static device profiles used to label results.

use crate::models::DeviceType;
use serde::Serialize;

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Emulated device characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    pub viewport: Viewport,
    pub user_agent: &'static str,
    pub network_speed: &'static str,
}

const DESKTOP: DeviceProfile = DeviceProfile {
    viewport: Viewport {
        width: 1350,
        height: 940,
    },
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    network_speed: "10 Mbps",
};

const MOBILE: DeviceProfile = DeviceProfile {
    viewport: Viewport {
        width: 412,
        height: 823,
    },
    user_agent: "Mozilla/5.0 (Linux; Android 11; moto g power (2022)) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    network_speed: "Slow 4G",
};

/// Look up the profile for a device type.
pub fn profile(device: DeviceType) -> &'static DeviceProfile {
    match device {
        DeviceType::Desktop => &DESKTOP,
        DeviceType::Mobile => &MOBILE,
    }
}
