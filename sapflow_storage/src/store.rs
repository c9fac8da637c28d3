use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;
use serde_json::Error as SerdeError;

use super::profile::ConnectionProfile;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// `~/.config/sapflow/profiles` on Linux, `%APPDATA%\sapflow\profiles`
    /// on Windows, etc.
    pub fn new() -> io::Result<Self> {
        let proj = ProjectDirs::from("", "", "sapflow")
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unable to locate config dir"))?;
        Self::at(proj.config_dir().join("profiles"))
    }

    /// Store rooted at an explicit directory; tests point this at a tempdir.
    pub fn at(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Returns every stored profile (silently skips malformed files).
    pub fn list(&self) -> io::Result<Vec<ConnectionProfile>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match fs::File::open(&path)
                .and_then(|f| serde_json::from_reader(f).map_err(SerdeError::into))
            {
                Ok(profile) => out.push(profile),
                Err(e) => eprintln!("Warning: could not read {:?}: {e}", path),
            }
        }
        Ok(out)
    }

    /// Look up one profile by name (`Ok(None)` if it doesn't exist).
    pub fn get(&self, name: &str) -> io::Result<Option<ConnectionProfile>> {
        match fs::File::open(self.file_for(name)) {
            Ok(file) => serde_json::from_reader(file).map(Some).map_err(SerdeError::into),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or overwrite a profile.
    pub fn save(&self, profile: &ConnectionProfile) -> io::Result<()> {
        let file = fs::File::create(self.file_for(&profile.name))?;
        serde_json::to_writer_pretty(file, profile).map_err(SerdeError::into)
    }

    /// Delete a profile (`Ok(true)` if removed, `Ok(false)` if it didn't exist).
    pub fn delete(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.file_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile {
            name: name.to_string(),
            environment: "1.01 - SAP PRD - S/4".to_string(),
            username: "ADMIN".to_string(),
            client_executable: None,
            warehouse: None,
            smtp: None,
        }
    }

    #[test]
    fn save_get_delete_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ProfileStore::at(dir.path().to_path_buf())?;

        store.save(&profile("prod"))?;
        let loaded = store.get("prod")?.expect("profile should exist");
        assert_eq!(loaded.environment, "1.01 - SAP PRD - S/4");

        assert!(store.delete("prod")?);
        assert!(!store.delete("prod")?);
        assert!(store.get("prod")?.is_none());
        Ok(())
    }

    #[test]
    fn list_skips_malformed_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ProfileStore::at(dir.path().to_path_buf())?;

        store.save(&profile("prod"))?;
        store.save(&profile("qa"))?;
        std::fs::write(dir.path().join("broken.json"), "{ not json")?;

        let mut names: Vec<String> = store.list()?.into_iter().map(|p| p.name).collect();
        names.sort();
        assert_eq!(names, vec!["prod", "qa"]);
        Ok(())
    }

    #[test]
    fn missing_optional_fields_default() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("lean.json"),
            r#"{ "name": "lean", "environment": "1.02 - SAP QAS - S/4", "username": "ROBOT" }"#,
        )?;
        let store = ProfileStore::at(dir.path().to_path_buf())?;

        let loaded = store.get("lean")?.expect("profile should exist");
        assert!(loaded.client_executable.is_none());
        assert!(loaded.warehouse.is_none());
        assert!(loaded.smtp.is_none());
        Ok(())
    }
}
