use crate::{
    config::{append_slash, Config, JupyterConfig},
    errors::Result,
    files,
};

/// Returns the notebook server config path inside the environment.
pub fn config_path(cfg: &Config) -> String {
    format!(
        "{}etc/jupyter/jupyter_notebook_config.py",
        append_slash(&cfg.anaconda.prefix)
    )
}

/// Renders "jupyter_notebook_config.py" as python assignments.
pub fn render(cfg: &JupyterConfig) -> String {
    let lines = [
        format!("c.Application.log_level = {}", py_str(&cfg.log_level)),
        format!("c.NotebookApp.ip = {}", py_str(&cfg.ip)),
        format!("c.NotebookApp.open_browser = {}", py_bool(cfg.open_browser)),
        format!("c.NotebookApp.port = {}", cfg.port),
        format!("c.NotebookApp.token = {}", py_str(&cfg.token)),
        format!(
            "c.NotebookApp.contents_manager_class = {}",
            py_str(&cfg.contents_manager_class)
        ),
    ];

    let mut d = lines.join("\n");
    d.push('\n');
    d
}

/// Writes the notebook server config and returns its path.
pub fn write(cfg: &Config) -> Result<String> {
    let p = config_path(cfg);
    log::info!("writing notebook config '{}'", p);

    files::write_file(&p, &render(&cfg.jupyter))?;
    Ok(p)
}

fn py_str(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// RUST_LOG=debug cargo test --package notebook-init --lib -- files::jupyter::test_render --exact --show-output
#[test]
fn test_render() {
    let cfg = Config::default();
    assert_eq!(
        render(&cfg.jupyter),
        "c.Application.log_level = \"DEBUG\"
c.NotebookApp.ip = \"127.0.0.1\"
c.NotebookApp.open_browser = False
c.NotebookApp.port = 8123
c.NotebookApp.token = \"\"
c.NotebookApp.contents_manager_class = \"jgscm.GoogleStorageContentManager\"
"
    );
    assert_eq!(
        config_path(&cfg),
        "/home/anaconda2/etc/jupyter/jupyter_notebook_config.py"
    );
}

#[test]
fn test_py_str_escapes() {
    assert_eq!(py_str("a\"b"), "\"a\\\"b\"");
    assert_eq!(py_str("c:\\x"), "\"c:\\\\x\"");
}
