//! # Signup-Probe 入口
//!
//! 注册流程校验探针的入口点：加载配置、建立会话注册表、驱动一次完整的
//! 注册流程校验，并在任何退出路径上清理所有浏览器会话。
//!
//! ## 环境变量
//! - `PROBE_BASE_URL`: 被测环境的基础 URL
//! - `PROBE_BROWSER`: 浏览器种类（chrome / chromium / edge）
//! - `PROBE_HEADLESS`: 是否无头运行（默认 true）
//! - `PROBE_CDP_ENDPOINT`: 附着到已运行浏览器的 DevTools 端点
//! - `RUST_LOG`: 日志级别

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use signup_probe::{
    action::ActionExecutor,
    config::Config,
    flow,
    report::{EventSink, FileScreenshotSink},
    session::{LauncherBackend, SessionRegistry},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    info!("Signup-Probe v{}", signup_probe::VERSION);

    // Configuration: file path argument wins, environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };
    info!(
        "Configuration loaded: browser={}, target={}",
        config.browser,
        config.signup_url()
    );

    let sink: Arc<dyn EventSink> = Arc::new(FileScreenshotSink::new(&config.screenshot_dir));
    let executor = ActionExecutor::new(&config, Arc::clone(&sink));
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(LauncherBackend::new()),
        config,
    ));

    let details = flow::SignupDetails::generated();
    let outcome = flow::verify_signup(&registry, &executor, "main", &details).await;

    // Suite-level teardown always runs; one stuck session must not block
    // the rest.
    let report = registry.release_all().await;
    for (worker, err) in &report.failures {
        error!("Session for worker {} failed to close: {}", worker, err);
    }

    match outcome {
        Ok(()) => {
            info!("Signup flow verified for {}", details.email);
            Ok(())
        }
        Err(e) => {
            error!("Signup flow verification failed: {}", e);
            std::process::exit(1);
        }
    }
}
