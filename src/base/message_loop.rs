use crate::base::message_queue::{Message, MessageQueue, TaskClosure};
use crate::base::task_runner::TaskRunner;
use crate::core::{log_ctx, PlayerError, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// 默认的任务预期执行时长，超过会打印警告
pub const DEFAULT_SLOW_TASK_WARNING: Duration = Duration::from_millis(20);

/// 延迟任务的最长延迟，超过按此值计
pub const MAX_TASK_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// 消息循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Prepared,
    Looping,
    Quit,
}

thread_local! {
    static CURRENT_LOOP: RefCell<Option<Arc<LoopInner>>> = const { RefCell::new(None) };
}

pub(crate) struct LoopInner {
    name: String,
    queue: MessageQueue,
    state: Mutex<LoopState>,
    thread_id: Mutex<Option<ThreadId>>,
    slow_task_warning: Duration,
    next_runner_id: AtomicU64,
}

impl LoopInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enqueue(
        &self,
        delay: Duration,
        task: TaskClosure,
        posted_from: &'static Location<'static>,
        runner_id: Option<u64>,
        task_id: u64,
    ) -> bool {
        let when = Instant::now() + delay.min(MAX_TASK_DELAY);
        let message = Message::new(task, when, posted_from, runner_id, task_id);
        self.queue.enqueue(message)
    }

    pub(crate) fn remove_tasks(&self, runner_id: u64, task_id: Option<u64>) -> usize {
        self.queue.remove_tasks(runner_id, task_id)
    }

    pub(crate) fn allocate_runner_id(&self) -> u64 {
        self.next_runner_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn belongs_to_current_thread(self: &Arc<Self>) -> bool {
        CURRENT_LOOP.with(|current| {
            current
                .borrow()
                .as_ref()
                .map_or(false, |inner| Arc::ptr_eq(inner, self))
        })
    }

    pub(crate) fn current() -> Option<Arc<LoopInner>> {
        CURRENT_LOOP.with(|current| current.borrow().clone())
    }

    fn set_state(&self, state: LoopState) {
        *self.state.lock() = state;
    }

    fn quit(&self) {
        self.queue.quit();
        let mut state = self.state.lock();
        if *state != LoopState::Looping {
            *state = LoopState::Quit;
        }
    }

    fn prepare(self: &Arc<Self>) {
        CURRENT_LOOP.with(|current| *current.borrow_mut() = Some(self.clone()));
        *self.thread_id.lock() = Some(thread::current().id());
        self.set_state(LoopState::Prepared);
    }

    fn run(self: &Arc<Self>) {
        self.set_state(LoopState::Looping);
        info!("{} 🔁 消息循环 {} 开始", log_ctx(), self.name);

        while let Some(message) = self.queue.next() {
            let posted_from = message.posted_from();
            let start = Instant::now();
            (message.task)();
            let elapsed = start.elapsed();
            if elapsed > self.slow_task_warning {
                warn!(
                    "{} 🐢 任务执行过慢: {:?} (预期 {:?})，投递自 {}",
                    log_ctx(),
                    elapsed,
                    self.slow_task_warning,
                    posted_from
                );
            }
        }

        self.set_state(LoopState::Quit);
        CURRENT_LOOP.with(|current| *current.borrow_mut() = None);
        info!("{} 🛑 消息循环 {} 结束", log_ctx(), self.name);
    }
}

/// 单线程消息循环
///
/// 每个循环独占一个系统线程，按计划时刻执行投递的任务。
/// 其他线程只能通过投递任务与循环所在线程交互。
/// 销毁时退出循环并等待线程结束。
pub struct MessageLoop {
    inner: Arc<LoopInner>,
    thread: Option<JoinHandle<()>>,
}

impl MessageLoop {
    /// 创建消息循环并在新线程中运行
    pub fn prepare_looper(name: &str) -> Result<Self> {
        Self::prepare_looper_with(name, DEFAULT_SLOW_TASK_WARNING)
    }

    pub fn prepare_looper_with(name: &str, slow_task_warning: Duration) -> Result<Self> {
        let inner = Arc::new(LoopInner {
            name: name.to_string(),
            queue: MessageQueue::new(),
            state: Mutex::new(LoopState::Uninitialized),
            thread_id: Mutex::new(None),
            slow_task_warning,
            next_runner_id: AtomicU64::new(0),
        });

        let thread_inner = inner.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                thread_inner.prepare();
                thread_inner.run();
            })
            .map_err(|e| PlayerError::SchedulerError(format!("无法创建线程 {}: {}", name, e)))?;

        debug!("{} 创建消息循环 {}", log_ctx(), name);
        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> LoopState {
        *self.inner.state.lock()
    }

    /// 投递任务，返回是否入队成功（循环退出后返回 false）
    #[track_caller]
    pub fn post_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .enqueue(Duration::ZERO, Box::new(task), Location::caller(), None, 0)
    }

    #[track_caller]
    pub fn post_delayed_task<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .enqueue(delay, Box::new(task), Location::caller(), None, 0)
    }

    /// 当前线程是否就是该循环所在的线程
    pub fn belongs_to_current_thread(&self) -> bool {
        self.inner.belongs_to_current_thread()
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        *self.inner.thread_id.lock()
    }

    /// 为该循环创建一个新的 TaskRunner（拥有独立的任务归属编号）
    pub fn task_runner(&self) -> TaskRunner {
        TaskRunner::attach(self.inner.clone())
    }

    /// 当前线程所在的消息循环名称
    pub fn current_name() -> Option<String> {
        LoopInner::current().map(|inner| inner.name.clone())
    }

    /// 当前线程是否运行着消息循环
    pub fn is_current_thread_looping() -> bool {
        LoopInner::current().is_some()
    }

    /// 退出循环，丢弃所有未执行的任务
    pub fn quit(&self) {
        self.inner.quit();
    }

    /// 退出并等待线程结束
    pub fn join(mut self) {
        self.quit_and_join();
    }

    fn quit_and_join(&mut self) {
        self.inner.quit();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                // 在自己的线程里销毁，只能分离
                return;
            }
            if thread.join().is_err() {
                warn!("{} ⚠️ 消息循环 {} 线程异常退出", log_ctx(), self.inner.name);
            }
        }
    }
}

impl Drop for MessageLoop {
    fn drop(&mut self) {
        self.quit_and_join();
    }
}

impl std::fmt::Debug for MessageLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLoop")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_post_task_runs_on_loop_thread() {
        let looper = MessageLoop::prepare_looper("test_looper").unwrap();
        let (tx, rx) = unbounded();
        looper.post_task(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send((name, MessageLoop::current_name())).unwrap();
        });
        let (thread_name, loop_name) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(thread_name.as_deref(), Some("test_looper"));
        assert_eq!(loop_name.as_deref(), Some("test_looper"));
        assert_eq!(looper.state(), LoopState::Looping);
        assert!(!looper.belongs_to_current_thread());
    }

    #[test]
    fn test_delayed_tasks_run_in_deadline_then_post_order() {
        let looper = MessageLoop::prepare_looper("order_looper").unwrap();
        let (tx, rx) = unbounded();
        for (task, delay_ms) in [(1, 50), (2, 10), (3, 10)] {
            let tx = tx.clone();
            looper.post_delayed_task(Duration::from_millis(delay_ms), move || {
                tx.send(task).unwrap();
            });
        }
        let order: Vec<i32> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_nested_post_from_task() {
        let looper = Arc::new(MessageLoop::prepare_looper("nested_looper").unwrap());
        let (tx, rx) = unbounded();
        let nested = looper.clone();
        looper.post_task(move || {
            assert!(nested.belongs_to_current_thread());
            let inner_tx = tx.clone();
            nested.post_task(move || inner_tx.send("inner").unwrap());
            tx.send("outer").unwrap();
        });
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "outer");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "inner");
    }

    #[test]
    fn test_post_after_quit_is_dropped() {
        let looper = MessageLoop::prepare_looper("quit_looper").unwrap();
        looper.quit();
        assert!(!looper.post_task(|| panic!("must not run")));
        looper.join();
    }

    #[test]
    fn test_quit_drops_pending_tasks() {
        let looper = MessageLoop::prepare_looper("pending_looper").unwrap();
        let (tx, rx) = unbounded::<()>();
        looper.post_delayed_task(Duration::from_millis(200), move || tx.send(()).unwrap());
        looper.quit();
        // 闭包被丢弃，发送端随之销毁
        assert!(rx.recv_timeout(WAIT).is_err());
        drop(looper);
    }

    #[test]
    fn test_oversized_delay_is_clamped() {
        let looper = MessageLoop::prepare_looper("far_looper").unwrap();
        let (tx, rx) = unbounded();
        let far_tx = tx.clone();
        assert!(looper.post_delayed_task(Duration::MAX, move || far_tx.send("far").unwrap()));
        looper.post_task(move || tx.send("now").unwrap());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "now");
    }
}
