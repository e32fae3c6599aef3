use std::process;
use std::thread;

/// 日志上下文前缀：进程 id + 线程名（没有名字时退回线程 id）
pub fn log_ctx() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => format!("[pid:{} {}]", process::id(), name),
        None => format!("[pid:{} tid:{:?}]", process::id(), current.id()),
    }
}

/// 初始化日志
///
/// 默认级别由调用方给出，`RUST_LOG` 环境变量可以覆盖。
/// 重复调用不会 panic（宿主程序和测试都可能多次初始化）。
pub fn init_logger(level: log::LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init();
}

/// 测试专用日志初始化（输出交给测试框架捕获）
pub fn init_test_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
