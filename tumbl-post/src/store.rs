//! Credential file persistence for tumbl-post

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use libtumblcast::Credential;

/// Default credential file: `<data_dir>/tumblcast/credential.json`
pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data_dir.join("tumblcast").join("credential.json"))
}

pub fn load(path: &Path) -> Result<Credential> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read credential file {} (run `tumbl-post exchange` first)",
            path.display()
        )
    })?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid credential file {}", path.display()))
}

/// Write the credential, readable by the owner only
pub fn save(path: &Path, credential: &Credential) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(credential)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write credential file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    tracing::debug!("Saved credential to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn credential() -> Credential {
        Credential {
            subject_id: "alice".to_string(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            display_name: "alice".to_string(),
            avatar_url: String::new(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("credential.json");

        save(&path, &credential()).unwrap();
        assert_eq!(load(&path).unwrap(), credential());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_missing_file_mentions_exchange() {
        let temp_dir = TempDir::new().unwrap();
        let err = load(&temp_dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("tumbl-post exchange"));
    }
}
