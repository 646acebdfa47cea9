use crate::{
    config::{append_slash, Config},
    errors::Result,
    files,
};

/// Renders the systemd unit that keeps the notebook server running.
/// ref. https://www.freedesktop.org/software/systemd/man/systemd.service.html
pub fn render(cfg: &Config) -> String {
    let svc = &cfg.service;
    format!(
        "[Unit]
Description={description}
After={after}

[Service]
Type=simple
User={user}
Group={group}
WorkingDirectory={working_dir}
ExecStart={python} {jupyter} notebook
Restart={restart}
RestartSec={restart_sec}

[Install]
WantedBy={wanted_by}
",
        description = svc.description,
        after = svc.after,
        user = svc.user,
        group = svc.group,
        working_dir = append_slash(&cfg.artifacts.dir),
        python = cfg.anaconda.python(),
        jupyter = cfg.anaconda.jupyter(),
        restart = svc.restart,
        restart_sec = svc.restart_sec,
        wanted_by = svc.wanted_by,
    )
}

/// Writes the unit file and returns its path.
pub fn write(cfg: &Config) -> Result<String> {
    let p = cfg.service.unit_path();
    log::info!("writing service unit '{}'", p);

    files::write_file(&p, &render(cfg))?;
    Ok(p)
}
