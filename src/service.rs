use crate::{
    command::{Command, Runner},
    config::Config,
    errors::Result,
};

/// Enables the notebook extensions, then registers the unit with systemd
/// and starts it.
///
/// e.g.,
/// jupyter serverextension enable --user --py jupyter_spark
/// systemctl daemon-reload
/// systemctl enable jupyter
/// systemctl start jupyter
pub fn register(runner: &dyn Runner, cfg: &Config) -> Result<()> {
    for cmd in extension_commands(cfg).iter().chain(systemd_commands(cfg).iter()) {
        runner.run(cmd)?;
    }

    log::info!("started service '{}'", cfg.service.name);
    Ok(())
}

/// Commands that turn on the spark progress and widget notebook extensions.
pub fn extension_commands(cfg: &Config) -> Vec<Command> {
    let jupyter = cfg.anaconda.jupyter();
    vec![
        Command::new(&jupyter).args(&["serverextension", "enable", "--user", "--py", "jupyter_spark"]),
        Command::new(&jupyter).args(&["nbextension", "install", "--user", "--py", "jupyter_spark"]),
        Command::new(&jupyter).args(&["nbextension", "enable", "--user", "--py", "jupyter_spark"]),
        Command::new(&jupyter).args(&["nbextension", "enable", "--user", "--py", "widgetsnbextension"]),
    ]
}

pub fn systemd_commands(cfg: &Config) -> Vec<Command> {
    let name = cfg.service.name.as_str();
    vec![
        Command::new("systemctl").arg("daemon-reload"),
        Command::new("systemctl").args(&["enable", name]),
        Command::new("systemctl").args(&["start", name]),
    ]
}
