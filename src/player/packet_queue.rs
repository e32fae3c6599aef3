use crate::core::{Rational, Serial, StreamType};
use crate::player::packet::{Dequeued, Packet, QueueItem};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 每个队列项的固定开销，计入字节数
const ENTRY_OVERHEAD: usize = std::mem::size_of::<QueueEntry>();

#[derive(Debug)]
struct QueueEntry {
    item: QueueItem,
    serial: Serial,
}

#[derive(Debug)]
struct QueueInner {
    entries: VecDeque<QueueEntry>,
    /// 字节数（含每项开销）
    size: usize,
    /// 包时长之和（单位为流时间基）
    duration: i64,
    serial: Serial,
    abort_request: bool,
}

/// 压缩包队列
///
/// 解封装线程写入，解码线程读取。每次 `put_flush` 代数号加一，
/// 解码端据此丢弃 seek 之前的旧包。
#[derive(Debug)]
pub struct PacketQueue {
    stream: StreamType,
    inner: Mutex<QueueInner>,
    cond: Condvar,
    /// 代数号镜像，时钟据此判断自己是否过期（无需加锁读取）
    serial_handle: Arc<AtomicU64>,
}

impl PacketQueue {
    /// 新建的队列处于 abort 状态，调用 `start()` 之后才能写入
    pub fn new(stream: StreamType) -> Self {
        Self {
            stream,
            inner: Mutex::new(QueueInner {
                entries: VecDeque::new(),
                size: 0,
                duration: 0,
                serial: 0,
                abort_request: true,
            }),
            cond: Condvar::new(),
            serial_handle: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn stream(&self) -> StreamType {
        self.stream
    }

    /// 清除 abort 标志，并放入第一个代数分界
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.abort_request = false;
        self.push_locked(&mut inner, QueueItem::Flush);
    }

    /// 中止：唤醒所有等待者，阻塞的读取立即返回
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.abort_request = true;
        self.cond.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().abort_request
    }

    /// 写入一个数据包；队列已中止时返回 false
    pub fn put(&self, packet: Packet) -> bool {
        self.put_item(QueueItem::Packet(packet))
    }

    /// 写入代数分界，代数号加一
    pub fn put_flush(&self) -> bool {
        self.put_item(QueueItem::Flush)
    }

    /// 写入流结束标记
    pub fn put_null_packet(&self) -> bool {
        self.put_item(QueueItem::Eof)
    }

    fn put_item(&self, item: QueueItem) -> bool {
        let mut inner = self.inner.lock();
        if inner.abort_request {
            return false;
        }
        self.push_locked(&mut inner, item);
        true
    }

    fn push_locked(&self, inner: &mut MutexGuard<'_, QueueInner>, item: QueueItem) {
        if item.is_flush() {
            inner.serial += 1;
            self.serial_handle.store(inner.serial, Ordering::Release);
        }
        inner.size += item.byte_size() + ENTRY_OVERHEAD;
        inner.duration += item.duration();
        let serial = inner.serial;
        inner.entries.push_back(QueueEntry { item, serial });
        self.cond.notify_all();
    }

    /// 清空队列，不改变代数号
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        Self::clear_locked(&mut inner);
    }

    fn clear_locked(inner: &mut QueueInner) {
        inner.entries.clear();
        inner.size = 0;
        inner.duration = 0;
    }

    /// 开始新的代数：清空旧包并放入分界，两步在同一把锁内完成
    ///
    /// 返回新的代数号；队列已中止时返回 None。
    pub fn begin_new_generation(&self) -> Option<Serial> {
        let mut inner = self.inner.lock();
        if inner.abort_request {
            return None;
        }
        Self::clear_locked(&mut inner);
        self.push_locked(&mut inner, QueueItem::Flush);
        Some(inner.serial)
    }

    fn pop_locked(inner: &mut QueueInner) -> Option<QueueEntry> {
        let entry = inner.entries.pop_front()?;
        inner.size = inner
            .size
            .saturating_sub(entry.item.byte_size() + ENTRY_OVERHEAD);
        inner.duration -= entry.item.duration();
        Some(entry)
    }

    /// 读取一项
    ///
    /// `block` 为 true 时在队列为空时等待；每次进入等待之前调用一次 `on_block`
    /// （不持有队列锁），用于通知解封装端继续读取。
    pub fn get<F: FnMut()>(&self, block: bool, mut on_block: F) -> Dequeued {
        let mut inner = self.inner.lock();
        let mut block_notified = false;
        loop {
            if inner.abort_request {
                return Dequeued::Aborted;
            }
            if let Some(entry) = Self::pop_locked(&mut inner) {
                return Dequeued::Item {
                    item: entry.item,
                    serial: entry.serial,
                };
            }
            if !block {
                return Dequeued::Empty;
            }
            if !block_notified {
                block_notified = true;
                MutexGuard::unlocked(&mut inner, &mut on_block);
                continue;
            }
            self.cond.wait(&mut inner);
            block_notified = false;
        }
    }

    /// 非阻塞读取
    pub fn dequeue_packet(&self) -> Dequeued {
        self.get(false, || {})
    }

    /// 唤醒阻塞在 `get` 上的读取者（不改变队列内容）
    pub fn signal(&self) {
        let _inner = self.inner.lock();
        self.cond.notify_all();
    }

    pub fn serial(&self) -> Serial {
        self.inner.lock().serial
    }

    /// 代数号句柄，供时钟判断过期
    pub fn serial_handle(&self) -> Arc<AtomicU64> {
        self.serial_handle.clone()
    }

    /// 队列中的项数（含分界与结束标记）
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size
    }

    /// 队列中数据的时长（流时间基）
    pub fn duration(&self) -> i64 {
        self.inner.lock().duration
    }

    /// 缓存是否足够：包数超过 `min_frames`，并且时长未知或超过 `min_duration` 秒
    pub fn has_enough_packets(&self, time_base: Rational, min_frames: usize, min_duration: f64) -> bool {
        let inner = self.inner.lock();
        inner.abort_request
            || (inner.entries.len() > min_frames
                && (inner.duration == 0
                    || time_base.to_f64() * inner.duration as f64 > min_duration))
    }
}
