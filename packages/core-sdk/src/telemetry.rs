use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::TelemetrySettings;

static INSTALLED: OnceCell<()> = OnceCell::new();

/**
 * \brief 安装全局 tracing 订阅者：stderr 紧凑输出，可选追加写入日志文件。
 * \details 重复调用只生效一次。
 */
pub fn init(settings: &TelemetrySettings) -> Result<()> {
    INSTALLED.get_or_try_init(|| install(settings))?;
    Ok(())
}

fn install(settings: &TelemetrySettings) -> Result<()> {
    let filter = EnvFilter::try_new(&settings.filter)
        .with_context(|| format!("invalid log filter: {}", settings.filter))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file_layer = match &settings.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_timer(UtcTime::new(Rfc3339))
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber failed")?;
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log dir {} failed", dir.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {} failed", path.display()))
}
