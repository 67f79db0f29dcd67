use std::path::PathBuf;

const APP_DIR: &str = "lcdspot";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/lcdspot/ on every unix, the board is usually a Raspberry Pi
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(not(unix))]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(not(unix))]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// Device node for an I2C bus number, e.g. `/dev/i2c-1` on a Raspberry Pi.
pub fn i2c_device_path(bus: u8) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{}", bus))
}
