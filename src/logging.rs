//! 日志初始化

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 初始化全局订阅器；重复调用安全（测试里可能多次进入）
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .try_init();
}
