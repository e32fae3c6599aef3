use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::Location;
use std::time::Instant;

/// 投递到消息循环的任务
pub type TaskClosure = Box<dyn FnOnce() + Send + 'static>;

/// 队列中的一条消息
pub struct Message {
    pub(crate) task: TaskClosure,
    /// 计划执行时刻
    pub(crate) when: Instant,
    /// 插入序号，相同时刻按投递顺序执行
    pub(crate) seq: u64,
    pub(crate) posted_from: &'static Location<'static>,
    /// 投递者（TaskRunner）编号，直接投递到 loop 的任务为 None
    pub(crate) runner_id: Option<u64>,
    pub(crate) task_id: u64,
}

impl Message {
    pub fn new(
        task: TaskClosure,
        when: Instant,
        posted_from: &'static Location<'static>,
        runner_id: Option<u64>,
        task_id: u64,
    ) -> Self {
        Self {
            task,
            when,
            seq: 0,
            posted_from,
            runner_id,
            task_id,
        }
    }

    pub fn posted_from(&self) -> &'static Location<'static> {
        self.posted_from
    }

    fn key(&self) -> (Instant, u64) {
        (self.when, self.seq)
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Message {}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Message {
    // BinaryHeap 是大顶堆，反转后堆顶为最早到期的消息
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

struct QueueInner {
    messages: BinaryHeap<Message>,
    next_seq: u64,
    quitting: bool,
}

/// 按 (执行时刻, 插入序号) 排序的消息队列
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    condvar: Condvar,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                messages: BinaryHeap::new(),
                next_seq: 0,
                quitting: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// 入队；队列已退出时丢弃并返回 false
    pub fn enqueue(&self, mut message: Message) -> bool {
        let mut inner = self.inner.lock();
        if inner.quitting {
            drop(inner);
            log::debug!("向已退出的消息循环投递任务，已丢弃 ({})", message.posted_from);
            return false;
        }
        message.seq = inner.next_seq;
        inner.next_seq += 1;
        // 新消息成为堆顶时才需要唤醒（等待时长变短了）
        let need_wake = inner
            .messages
            .peek()
            .map_or(true, |head| message.key() < head.key());
        inner.messages.push(message);
        drop(inner);
        if need_wake {
            self.condvar.notify_one();
        }
        true
    }

    /// 取下一条到期的消息，没有到期消息时阻塞；队列退出后返回 None
    pub fn next(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        loop {
            if inner.quitting {
                return None;
            }
            let now = Instant::now();
            match inner.messages.peek().map(|head| head.when) {
                Some(when) if when <= now => return inner.messages.pop(),
                Some(when) => {
                    self.condvar.wait_until(&mut inner, when);
                }
                None => {
                    self.condvar.wait(&mut inner);
                }
            }
        }
    }

    /// 移除某个投递者的任务；`task_id` 为 None 时移除该投递者的全部任务
    ///
    /// 返回移除的数量。被移除的闭包在释放锁之后再销毁。
    pub fn remove_tasks(&self, runner_id: u64, task_id: Option<u64>) -> usize {
        let removed: Vec<Message> = {
            let mut inner = self.inner.lock();
            let (removed, kept): (Vec<Message>, Vec<Message>) =
                std::mem::take(&mut inner.messages)
                    .into_vec()
                    .into_iter()
                    .partition(|message| {
                        message.runner_id == Some(runner_id)
                            && task_id.map_or(true, |id| message.task_id == id)
                    });
            inner.messages = BinaryHeap::from(kept);
            removed
        };
        removed.len()
    }

    /// 退出：丢弃所有待执行任务并唤醒等待者
    pub fn quit(&self) {
        let dropped = {
            let mut inner = self.inner.lock();
            if inner.quitting {
                return;
            }
            inner.quitting = true;
            std::mem::take(&mut inner.messages)
        };
        self.condvar.notify_all();
        drop(dropped);
    }

    pub fn is_quitting(&self) -> bool {
        self.inner.lock().quitting
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
