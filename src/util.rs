//! Per-user configuration paths.

use std::path::PathBuf;

use crate::error::{Error, Result};

const CONFIG_DIR: &str = ".orchid";
const CHROME_PROFILE_DIR: &str = ".chrome";
const KEY_FILE: &str = "key.json";

/// Resolves `$HOME/.orchid`, creating it with owner-only permissions.
pub fn orchid_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(Error::ErrNoHomeDir)?;
    let dir = home.join(CONFIG_DIR);
    create_private_dir(&dir)?;
    Ok(dir)
}

/// Browser profile directory used by source nodes.
pub fn chrome_profile_dir() -> Result<PathBuf> {
    let dir = orchid_dir()?.join(CHROME_PROFILE_DIR);
    create_private_dir(&dir)?;
    Ok(dir)
}

/// Location of the node key file.
pub fn key_file() -> Result<PathBuf> {
    Ok(orchid_dir()?.join(KEY_FILE))
}

fn create_private_dir(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
