//! 消融实验与实验编排依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;

pub mod config;
pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 以 `level` (如 `"info"`, `"debug"`) 初始化全局日志. 无法识别的级别按 `info` 处理.
///
/// 环境变量 `RUST_LOG` 优先于 `level`. 重复初始化返回错误.
pub fn init_logger(level: &str) -> Result<(), log::SetLoggerError> {
    let level = level.parse().unwrap_or(LevelFilter::Info);
    SimpleLogger::new().with_level(level).env().init()
}
