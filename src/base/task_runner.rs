use crate::base::message_loop::LoopInner;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// 向某个消息循环投递并管理任务
///
/// 每个 TaskRunner 有自己的归属编号，`remove_task` / `remove_all_tasks`
/// 只影响经由它投递的任务。销毁时自动取消自己还没执行的任务。
/// `clone()` 得到的是一个新的归属者，两者互不影响。
pub struct TaskRunner {
    looper: Option<Arc<LoopInner>>,
    id: u64,
}

impl TaskRunner {
    pub(crate) fn attach(looper: Arc<LoopInner>) -> Self {
        let id = looper.allocate_runner_id();
        Self {
            looper: Some(looper),
            id,
        }
    }

    /// 未绑定任何循环的空 runner，投递的任务全部丢弃
    pub fn detached() -> Self {
        Self { looper: None, id: 0 }
    }

    /// 当前线程所在消息循环的 runner；当前线程不是消息循环时返回 None
    pub fn current() -> Option<Self> {
        LoopInner::current().map(Self::attach)
    }

    pub fn is_attached(&self) -> bool {
        self.looper.is_some()
    }

    pub fn loop_name(&self) -> Option<&str> {
        self.looper.as_deref().map(LoopInner::name)
    }

    #[track_caller]
    pub fn post_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Duration::ZERO, 0, Box::new(task), Location::caller())
    }

    /// 带任务编号投递，之后可以用 `remove_task(task_id)` 取消
    #[track_caller]
    pub fn post_task_with_id<F>(&self, task_id: u64, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Duration::ZERO, task_id, Box::new(task), Location::caller())
    }

    #[track_caller]
    pub fn post_delayed_task<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(delay, 0, Box::new(task), Location::caller())
    }

    #[track_caller]
    pub fn post_delayed_task_with_id<F>(&self, delay: Duration, task_id: u64, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(delay, task_id, Box::new(task), Location::caller())
    }

    fn post(
        &self,
        delay: Duration,
        task_id: u64,
        task: Box<dyn FnOnce() + Send + 'static>,
        posted_from: &'static Location<'static>,
    ) -> bool {
        match &self.looper {
            Some(looper) => looper.enqueue(delay, task, posted_from, Some(self.id), task_id),
            None => false,
        }
    }

    /// 取消指定编号、尚未执行的任务
    pub fn remove_task(&self, task_id: u64) -> usize {
        self.looper
            .as_ref()
            .map_or(0, |looper| looper.remove_tasks(self.id, Some(task_id)))
    }

    /// 取消经由本 runner 投递、尚未执行的全部任务
    pub fn remove_all_tasks(&self) -> usize {
        self.looper
            .as_ref()
            .map_or(0, |looper| looper.remove_tasks(self.id, None))
    }

    pub fn belongs_to_current_thread(&self) -> bool {
        self.looper
            .as_ref()
            .map_or(false, |looper| looper.belongs_to_current_thread())
    }

    /// 取消所有任务并与循环解绑
    pub fn reset(&mut self) {
        self.remove_all_tasks();
        self.looper = None;
    }
}

impl Clone for TaskRunner {
    fn clone(&self) -> Self {
        match &self.looper {
            Some(looper) => Self::attach(looper.clone()),
            None => Self::detached(),
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.remove_all_tasks();
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("loop", &self.loop_name())
            .field("id", &self.id)
            .finish()
    }
}
