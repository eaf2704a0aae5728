// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

// PHY values
pub const LE_PHY_1M: u8 = 0x01;
pub const LE_PHY_2M: u8 = 0x02;
pub const LE_PHY_CODED: u8 = 0x03;

// LE Scan parameters
pub const LE_SCAN_INTERVAL: u16 = 0x0010; // 10 ms
pub const LE_SCAN_WINDOW: u16 = 0x0010; // 10 ms

// LE Advertising parameters
pub const LE_ADV_INTERVAL_MIN: u16 = 0x0800; // 1.28 s
pub const LE_ADV_INTERVAL_MAX: u16 = 0x0800;

// LE Connection parameters
pub const LE_CONN_INTERVAL_MIN: u16 = 0x0018; // 30 ms
pub const LE_CONN_INTERVAL_MAX: u16 = 0x0028; // 50 ms
pub const LE_CONN_LATENCY: u16 = 0x0000;
pub const LE_SUPERVISION_TIMEOUT: u16 = 0x0190; // 4 s

// Valid ranges (Core Vol 4, Part E, 7.8.12)
pub const LE_CONN_INTERVAL_LOWEST: u16 = 0x0006;
pub const LE_CONN_INTERVAL_HIGHEST: u16 = 0x0C80;
pub const LE_CONN_LATENCY_HIGHEST: u16 = 0x01F3;
pub const LE_SUPERVISION_TIMEOUT_LOWEST: u16 = 0x000A;
pub const LE_SUPERVISION_TIMEOUT_HIGHEST: u16 = 0x0C80;
