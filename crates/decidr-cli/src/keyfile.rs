//! Admin key files.
//!
//! `<name>.key` holds the private key and `<name>.pub` the public key, each
//! as one line of hex. The `.pub` contents are what a client passes to
//! `--admin-key`.

use std::fs;
use std::path::{Path, PathBuf};

use decidr_common::{Error, Result};
use decidr_crypto::StaticKeypair;
use zeroize::Zeroizing;

/// Public key file that sits next to `private_path`.
pub fn public_path(private_path: &Path) -> PathBuf {
    private_path.with_extension("pub")
}

/// Save `keypair` to `private_path` and its public half to [`public_path`].
///
/// The private key file is restricted to the owner (0600 on Unix).
pub fn save(keypair: &StaticKeypair, private_path: &Path) -> Result<PathBuf> {
    let private = Zeroizing::new(hex::encode(&keypair.export_private_key()[..]) + "\n");
    fs::write(private_path, private.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(private_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(private_path, perms)?;
    }

    let public_path = public_path(private_path);
    fs::write(&public_path, hex::encode(keypair.public_key()) + "\n")?;
    Ok(public_path)
}

/// Load the Admin keypair from a private key file written by [`save`].
pub fn load(private_path: &Path) -> Result<StaticKeypair> {
    let text = Zeroizing::new(fs::read_to_string(private_path)?);
    let bytes = Zeroizing::new(
        hex::decode(text.trim())
            .map_err(|e| Error::config(format!("{}: {e}", private_path.display())))?,
    );
    StaticKeypair::from_private_key(&bytes).map_err(Error::crypto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("decidr-{name}-{unique}"));
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_saved_key_loads_back() {
        let dir = temp_dir("keyfile");
        let private_path = dir.join("admin.key");
        let keypair = decidr_crypto::generate_static_keypair().unwrap();

        let public_path = save(&keypair, &private_path).unwrap();
        assert_eq!(public_path, dir.join("admin.pub"));
        assert_eq!(
            fs::read_to_string(&public_path).unwrap().trim(),
            hex::encode(keypair.public_key())
        );

        let loaded = load(&private_path).unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&private_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_load_rejects_bad_files() {
        let dir = temp_dir("keyfile-bad");

        let missing = load(&dir.join("missing.key")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));

        let not_hex = dir.join("not-hex.key");
        fs::write(&not_hex, "zz\n").unwrap();
        assert!(matches!(load(&not_hex).unwrap_err(), Error::Config(_)));

        let short = dir.join("short.key");
        fs::write(&short, hex::encode([1u8; 16])).unwrap();
        assert!(matches!(load(&short).unwrap_err(), Error::Crypto(_)));

        fs::remove_dir_all(dir).unwrap();
    }
}
