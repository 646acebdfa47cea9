use crate::{artifacts::Artifacts, config::Config, errors::Result, files};

/// Returns the "spark-defaults.conf" settings that ship the toolkit jar and
/// zip with every job and put the jar on the driver/executor classpath.
pub fn defaults_lines(artifacts: &Artifacts) -> Vec<String> {
    vec![
        format!("spark.files={}", artifacts.jar_path),
        format!("spark.submit.pyFiles={}", artifacts.zip_path),
        format!(
            "spark.driver.extraClassPath=./{}:{}",
            artifacts.jar, artifacts.jar_path
        ),
        format!(
            "spark.executor.extraClassPath=./{}:{}",
            artifacts.jar, artifacts.jar_path
        ),
    ]
}

/// Returns the "spark-env.sh" line pointing the driver at the environment's
/// python.
pub fn env_lines(cfg: &Config) -> Vec<String> {
    vec![format!("PYSPARK_DRIVER_PYTHON={}", cfg.anaconda.python())]
}

/// Updates the cluster's Spark configuration files. The defaults are set by
/// key so a new hash replaces the settings of the previous one.
pub fn write(cfg: &Config, artifacts: &Artifacts) -> Result<()> {
    log::info!("updating spark defaults '{}'", cfg.spark.defaults_conf);
    files::set_properties(&cfg.spark.defaults_conf, &defaults_lines(artifacts))?;

    log::info!("updating spark env '{}'", cfg.spark.env_sh);
    files::append_lines(&cfg.spark.env_sh, &env_lines(cfg))?;

    Ok(())
}

#[test]
fn test_defaults_lines() {
    let cfg = Config::default();
    let artifacts = Artifacts::new("abc123", &cfg.artifacts);
    let jar = "hail-hail-is-master-all-spark2.0.2-abc123.jar";

    assert_eq!(
        defaults_lines(&artifacts),
        vec![
            format!("spark.files=/home/hail/{jar}"),
            "spark.submit.pyFiles=/home/hail/pyhail-hail-is-master-abc123.zip".to_string(),
            format!("spark.driver.extraClassPath=./{jar}:/home/hail/{jar}"),
            format!("spark.executor.extraClassPath=./{jar}:/home/hail/{jar}"),
        ]
    );
    assert_eq!(
        env_lines(&cfg),
        vec!["PYSPARK_DRIVER_PYTHON=/home/anaconda2/bin/python"]
    );
}

/// RUST_LOG=debug cargo test --package notebook-init --lib -- files::spark::test_write_new_hash --exact --show-output
#[test]
fn test_write_new_hash() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.spark.defaults_conf = dir.path().join("spark-defaults.conf").display().to_string();
    cfg.spark.env_sh = dir.path().join("spark-env.sh").display().to_string();
    std::fs::write(&cfg.spark.defaults_conf, "spark.master yarn\n").unwrap();

    write(&cfg, &Artifacts::new("abc123", &cfg.artifacts)).unwrap();
    write(&cfg, &Artifacts::new("def456", &cfg.artifacts)).unwrap();

    let d = std::fs::read_to_string(&cfg.spark.defaults_conf).unwrap();
    assert_eq!(d.lines().count(), 5);
    assert!(d.starts_with("spark.master yarn\n"));
    assert!(!d.contains("abc123"));
    assert_eq!(d.matches("spark.files=").count(), 1);
    assert!(d.contains("spark.submit.pyFiles=/home/hail/pyhail-hail-is-master-def456.zip\n"));

    let d = std::fs::read_to_string(&cfg.spark.env_sh).unwrap();
    assert_eq!(d, "PYSPARK_DRIVER_PYTHON=/home/anaconda2/bin/python\n");
}
