//! Final presence check before the service starts.

use super::AssetSpec;

/// Read-only check that every asset landed where the service expects it.
pub struct AssetVerifier;

impl AssetVerifier {
    /// Return the assets whose final path is absent or empty.
    #[must_use]
    pub fn verify(specs: &[AssetSpec]) -> Vec<AssetSpec> {
        specs
            .iter()
            .filter(|spec| !Self::is_present(spec))
            .cloned()
            .collect()
    }

    fn is_present(spec: &AssetSpec) -> bool {
        match std::fs::metadata(&spec.local_path) {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetSource;
    use tempfile::tempdir;

    fn spec_at(path: std::path::PathBuf) -> AssetSpec {
        AssetSpec {
            name: "vae".into(),
            repo: "acme/models".into(),
            source: AssetSource::Single {
                remote: "vae.safetensors".into(),
            },
            local_path: path,
            requires_auth: false,
        }
    }

    #[test]
    fn present_nonempty_files_pass() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vae.safetensors");
        std::fs::write(&path, b"weights").unwrap();

        let missing = AssetVerifier::verify(&[spec_at(path)]);
        assert!(missing.is_empty());
    }

    #[test]
    fn absent_files_are_reported() {
        let dir = tempdir().unwrap();
        let missing = AssetVerifier::verify(&[spec_at(dir.path().join("gone.safetensors"))]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "vae");
    }

    #[test]
    fn empty_files_count_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vae.safetensors");
        std::fs::write(&path, b"").unwrap();

        let missing = AssetVerifier::verify(&[spec_at(path)]);
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn verification_is_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vae.safetensors");
        std::fs::write(&path, b"weights").unwrap();

        let _ = AssetVerifier::verify(&[spec_at(path.clone())]);
        assert_eq!(std::fs::read(&path).unwrap(), b"weights");
    }
}
