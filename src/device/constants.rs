use uuid::Uuid;

/**
 * How long (milliseconds) a scan runs before it is stopped automatically.
 */
pub const SCAN_TIMEOUT: u64 = 5000;

/**
 * How often (milliseconds) to check whether a connected peripheral is still connected.
 */
pub const POLL_DELAY: u64 = 1000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) establishing the connection to a peripheral may take.
 */
pub const CONNECT_DEADLINE: u64 = 10000;

/**
 * Shown instead of the advertised name when there is none, or when names may not be displayed.
 */
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/**
 * The 16 bit assigned number of the Bluetooth SIG Heart Rate service.
 */
pub const HEART_RATE_SERVICE_SHORT: u16 = 0x180D;

pub fn make_heart_rate_service_uuid() -> Uuid {
    btleplug::api::bleuuid::uuid_from_u16(HEART_RATE_SERVICE_SHORT)
}
