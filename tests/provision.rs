use std::{fs, path::Path};

use notebook_init::{
    command::RecordingRunner,
    config::{Config, RetryConfig},
    files::{jupyter, kernel},
    metadata::Role,
    provision::{self, Outcome},
};

/// Points every system path of the default config into "root".
fn scratch_config(root: &Path) -> Config {
    let r = root.display().to_string();
    let mut cfg = Config::default();
    cfg.anaconda.prefix = format!("{r}/home/anaconda2/");
    cfg.artifacts.dir = format!("{r}/home/hail/");
    cfg.spark.defaults_conf = format!("{r}/etc/spark/conf/spark-defaults.conf");
    cfg.spark.env_sh = format!("{r}/etc/spark/conf/spark-env.sh");
    cfg.service.unit_dir = format!("{r}/lib/systemd/system/");
    cfg.retry = RetryConfig {
        attempts: 2,
        interval_secs: 0,
    };
    cfg
}

fn seed_spark_conf(cfg: &Config) {
    fs::create_dir_all(Path::new(&cfg.spark.defaults_conf).parent().unwrap()).unwrap();
    fs::write(&cfg.spark.defaults_conf, "spark.master yarn\n").unwrap();
    fs::write(&cfg.spark.env_sh, "#!/usr/bin/env bash\n").unwrap();
}

fn master_runner() -> RecordingRunner {
    RecordingRunner::new().with_stdout("gsutil cat", "abc123\n")
}

#[test]
fn worker_is_a_no_op() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let cfg = scratch_config(dir.path());

    for role in [Role::Worker, Role::from("unexpected")] {
        let runner = master_runner();
        let outcome = provision::provision(&role, &cfg, &runner).unwrap();
        assert_eq!(outcome, Outcome::Skipped(role));
        assert!(runner.calls().is_empty());
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn master_provisions_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let cfg = scratch_config(dir.path());
    seed_spark_conf(&cfg);

    let runner = master_runner();
    let outcome = provision::provision(&Role::Master, &cfg, &runner).unwrap();
    assert_eq!(
        outcome,
        Outcome::Provisioned {
            hash: "abc123".to_string()
        }
    );

    let programs: Vec<String> = runner
        .calls()
        .iter()
        .map(|c| {
            Path::new(&c.program)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    assert_eq!(
        programs,
        vec![
            "wget", "bash", "pip", "pip", "pip", "gsutil", "gsutil", "gsutil", "jupyter",
            "jupyter", "jupyter", "jupyter", "systemctl", "systemctl", "systemctl",
        ]
    );

    let pip_args: Vec<Vec<String>> = runner
        .calls()
        .into_iter()
        .filter(|c| c.program.ends_with("/pip"))
        .map(|c| c.args)
        .collect();
    assert_eq!(
        pip_args,
        vec![
            vec!["install".to_string(), "lxml".to_string()],
            vec!["install".to_string(), "jupyter-spark".to_string()],
            vec!["install".to_string(), "jgscm".to_string()],
        ]
    );

    let lines = runner.lines();
    assert!(lines[6].ends_with(&format!(
        "'gs://hail-common/hail-hail-is-master-all-spark2.0.2-abc123.jar' {}",
        cfg.artifacts.dir
    )));
    assert_eq!(lines[14], "systemctl start jupyter");

    // kernel spec is JSON and references the trimmed hash
    let d = fs::read_to_string(kernel::spec_path(&cfg)).unwrap();
    let spec: kernel::KernelSpec = serde_json::from_str(&d).unwrap();
    assert!(spec.env["PYTHONPATH"].ends_with("pyhail-hail-is-master-abc123.zip"));
    assert!(!d.contains("abc123\\n"));

    let d = fs::read_to_string(jupyter::config_path(&cfg)).unwrap();
    assert!(d.contains("c.NotebookApp.ip = \"127.0.0.1\"\n"));
    assert!(d.contains("c.NotebookApp.port = 8123\n"));
    assert!(d.contains("c.NotebookApp.token = \"\"\n"));

    let d = fs::read_to_string(cfg.service.unit_path()).unwrap();
    assert!(d.contains(&format!(
        "\nExecStart={}bin/python {}bin/jupyter notebook\n",
        cfg.anaconda.prefix, cfg.anaconda.prefix
    )));

    let d = fs::read_to_string(&cfg.spark.defaults_conf).unwrap();
    assert!(d.starts_with("spark.master yarn\n"));
    assert_eq!(d.lines().count(), 5);
    let d = fs::read_to_string(&cfg.spark.env_sh).unwrap();
    assert!(d.ends_with(&format!(
        "PYSPARK_DRIVER_PYTHON={}bin/python\n",
        cfg.anaconda.prefix
    )));
}

#[test]
fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = scratch_config(dir.path());
    seed_spark_conf(&cfg);

    provision::provision(&Role::Master, &cfg, &master_runner()).unwrap();
    let paths = [
        kernel::spec_path(&cfg),
        jupyter::config_path(&cfg),
        cfg.service.unit_path(),
        cfg.spark.defaults_conf.clone(),
        cfg.spark.env_sh.clone(),
    ];
    let first: Vec<String> = paths
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();

    provision::provision(&Role::Master, &cfg, &master_runner()).unwrap();
    let second: Vec<String> = paths
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();

    assert_eq!(first, second);
}

#[test]
fn hash_failure_stops_before_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = scratch_config(dir.path());
    seed_spark_conf(&cfg);

    let runner = RecordingRunner::new().with_failure("gsutil cat", true);
    assert!(provision::provision(&Role::Master, &cfg, &runner).is_err());

    // wget, bash, three pip installs, then two failed reads
    assert_eq!(runner.calls().len(), 7);
    assert!(!Path::new(&kernel::spec_path(&cfg)).exists());
    assert!(!Path::new(&cfg.service.unit_path()).exists());
    assert_eq!(
        fs::read_to_string(&cfg.spark.defaults_conf).unwrap(),
        "spark.master yarn\n"
    );
}

#[test]
fn render_writes_previews() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let cfg = Config::default();

    let paths = provision::render(&cfg, "abc123", out.to_str().unwrap()).unwrap();
    assert_eq!(paths.len(), 5);
    for p in paths.iter() {
        assert!(Path::new(p).is_file(), "{p} missing");
    }

    let d = fs::read_to_string(out.join("spark-defaults.conf")).unwrap();
    assert!(d.contains("spark.files=/home/hail/hail-hail-is-master-all-spark2.0.2-abc123.jar"));
    assert!(out.join("jupyter.service").is_file());
}

#[test]
fn render_rejects_invalid_hash() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let cfg = Config::default();

    for hash in ["", "abc 123", "a/b", "abc123\n"] {
        assert!(provision::render(&cfg, hash, out.to_str().unwrap()).is_err());
    }
    assert!(!out.exists());
}

#[test]
fn new_hash_replaces_spark_settings() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = scratch_config(dir.path());
    seed_spark_conf(&cfg);

    provision::provision(&Role::Master, &cfg, &master_runner()).unwrap();
    let runner = RecordingRunner::new().with_stdout("gsutil cat", "def456\n");
    provision::provision(&Role::Master, &cfg, &runner).unwrap();

    let d = fs::read_to_string(&cfg.spark.defaults_conf).unwrap();
    assert_eq!(d.lines().count(), 5);
    assert!(!d.contains("abc123"));
    assert_eq!(d.matches("spark.driver.extraClassPath=").count(), 1);
}
