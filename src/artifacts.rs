use crate::{
    command::{run_with_retries, Command, Runner},
    config::{append_slash, ArtifactsConfig, RetryConfig, HASH_PLACEHOLDER},
    errors::{Error, Result},
    files,
};

/// Names and local paths of the hash-qualified toolkit archives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Artifacts {
    pub hash: String,
    /// Object name of the library jar.
    pub jar: String,
    /// Object name of the python code zip.
    pub zip: String,
    pub jar_path: String,
    pub zip_path: String,
}

impl Artifacts {
    pub fn new(hash: &str, cfg: &ArtifactsConfig) -> Self {
        let jar = cfg.jar_template.replace(HASH_PLACEHOLDER, hash);
        let zip = cfg.zip_template.replace(HASH_PLACEHOLDER, hash);
        let dir = append_slash(&cfg.dir);
        Self {
            hash: String::from(hash),
            jar_path: format!("{}{}", dir, jar),
            zip_path: format!("{}{}", dir, zip),
            jar,
            zip,
        }
    }
}

/// Reads the latest build hash from the marker object.
/// e.g., gsutil cat gs://hail-common/latest-hash.txt
pub fn fetch_hash(
    runner: &dyn Runner,
    cfg: &ArtifactsConfig,
    retry: &RetryConfig,
) -> Result<String> {
    let url = cfg.marker_url();
    log::info!("fetching latest hash from '{}'", url);

    let cmd = Command::new("gsutil")
        .args(&["cat", url.as_str()])
        .retryable(true);
    let out = run_with_retries(runner, &cmd, retry)?;

    let hash = out.stdout.trim();
    if hash.is_empty() {
        return Err(Error::Other {
            message: format!("marker object '{}' is empty", url),
            retryable: false,
        });
    }
    validate_hash(hash).map_err(|e| Error::Other {
        message: format!("marker object '{}': {}", url, e.message()),
        retryable: false,
    })?;

    log::info!("latest hash '{}'", hash);
    Ok(String::from(hash))
}

/// Rejects a hash that cannot be spliced into object names and local paths:
/// empty, or containing whitespace, a path separator or a shell
/// metacharacter.
pub fn validate_hash(hash: &str) -> Result<()> {
    if hash.is_empty() {
        return Err(Error::Config {
            message: "hash is empty".to_string(),
        });
    }
    if !hash
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || hash.starts_with('.')
    {
        return Err(Error::Config {
            message: format!("invalid hash '{}'", hash),
        });
    }
    Ok(())
}

/// Creates the local artifact directory and copies the jar and zip into it.
/// e.g., gsutil cp gs://hail-common/pyhail-hail-is-master-{hash}.zip /home/hail/
pub fn download(
    runner: &dyn Runner,
    cfg: &ArtifactsConfig,
    retry: &RetryConfig,
    artifacts: &Artifacts,
) -> Result<()> {
    files::ensure_dir(&cfg.dir, cfg.mode)?;

    let dir = append_slash(&cfg.dir);
    for object in [&artifacts.jar, &artifacts.zip] {
        let src = cfg.object_url(object);
        log::info!("downloading '{}' to '{}'", src, dir);

        let cmd = Command::new("gsutil")
            .args(&["cp", src.as_str(), dir.as_str()])
            .retryable(true);
        run_with_retries(runner, &cmd, retry)?;
    }

    Ok(())
}

/// RUST_LOG=debug cargo test --package notebook-init --lib -- artifacts::test_artifacts_new --exact --show-output
#[test]
fn test_artifacts_new() {
    let cfg = ArtifactsConfig::default();
    let a = Artifacts::new("abc123", &cfg);
    assert_eq!(a.jar, "hail-hail-is-master-all-spark2.0.2-abc123.jar");
    assert_eq!(a.zip, "pyhail-hail-is-master-abc123.zip");
    assert_eq!(a.jar_path, "/home/hail/hail-hail-is-master-all-spark2.0.2-abc123.jar");
    assert_eq!(a.zip_path, "/home/hail/pyhail-hail-is-master-abc123.zip");
}

/// RUST_LOG=debug cargo test --package notebook-init --lib -- artifacts::test_validate_hash --exact --show-output
#[test]
fn test_validate_hash() {
    assert!(validate_hash("abc123").is_ok());
    assert!(validate_hash("0.2-rc_1").is_ok());
    for bad in ["", "abc 123", "a/b", "..", "abc\n", "$(id)", "a;b"] {
        let e = validate_hash(bad).unwrap_err();
        assert!(!e.retryable(), "{bad:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RecordingRunner;

    fn no_wait() -> RetryConfig {
        RetryConfig {
            attempts: 2,
            interval_secs: 0,
        }
    }

    #[test]
    fn test_fetch_hash_trims() {
        let _ = env_logger::builder().is_test(true).try_init();

        let runner = RecordingRunner::new().with_stdout("gsutil cat", "abc123\n");
        let cfg = ArtifactsConfig::default();
        let hash = fetch_hash(&runner, &cfg, &no_wait()).unwrap();
        assert_eq!(hash, "abc123");
        assert_eq!(
            runner.lines(),
            vec!["gsutil cat 'gs://hail-common/latest-hash.txt'"]
        );

        let a = Artifacts::new(&hash, &cfg);
        assert!(a.jar.ends_with("-abc123.jar"));
        assert!(!a.zip.contains('\n'));
    }

    #[test]
    fn test_fetch_hash_empty() {
        let runner = RecordingRunner::new().with_stdout("gsutil cat", " \n");
        let e = fetch_hash(&runner, &ArtifactsConfig::default(), &no_wait()).unwrap_err();
        assert!(e.message().contains("is empty"));
    }

    #[test]
    fn test_fetch_hash_invalid() {
        let runner = RecordingRunner::new().with_stdout("gsutil cat", "abc/../x\n");
        let e = fetch_hash(&runner, &ArtifactsConfig::default(), &no_wait()).unwrap_err();
        assert!(e.message().contains("invalid hash"));
    }

    #[test]
    fn test_fetch_hash_retries_then_fails() {
        let runner = RecordingRunner::new().with_failure("gsutil cat", true);
        assert!(fetch_hash(&runner, &ArtifactsConfig::default(), &no_wait()).is_err());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ArtifactsConfig {
            dir: dir.path().join("hail").display().to_string(),
            ..Default::default()
        };
        let a = Artifacts::new("abc123", &cfg);

        let runner = RecordingRunner::new();
        download(&runner, &cfg, &no_wait(), &a).unwrap();

        assert!(dir.path().join("hail").is_dir());
        let target = format!("{}/", cfg.dir);
        assert_eq!(
            runner.lines(),
            vec![
                format!(
                    "gsutil cp 'gs://hail-common/hail-hail-is-master-all-spark2.0.2-abc123.jar' {}",
                    target
                ),
                format!(
                    "gsutil cp 'gs://hail-common/pyhail-hail-is-master-abc123.zip' {}",
                    target
                ),
            ]
        );
        assert!(runner.calls().iter().all(|c| c.retryable));
    }
}
