use crate::core::{Rational, Serial, StreamType};

/// 压缩数据包（从容器中读出，尚未解码）
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream: StreamType,
    pub data: Vec<u8>,
    /// 单位为 `time_base`
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub time_base: Rational,
    pub is_key: bool,
}

impl Packet {
    pub fn new(stream: StreamType, data: Vec<u8>, pts: Option<i64>, time_base: Rational) -> Self {
        Self {
            stream,
            data,
            pts,
            dts: pts,
            duration: 0,
            time_base,
            is_key: false,
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// pts（秒），没有 pts 时退回 dts
    pub fn pts_seconds(&self) -> Option<f64> {
        self.pts
            .or(self.dts)
            .map(|ts| ts as f64 * self.time_base.to_f64())
    }
}

/// 包队列里的一项
#[derive(Debug, Clone)]
pub enum QueueItem {
    Packet(Packet),
    /// 代数分界：之后的包属于新的代数，解码器需要清空内部状态
    Flush,
    /// 流结束：解码器收到后把缓存的帧全部吐出
    Eof,
}

impl QueueItem {
    pub fn is_flush(&self) -> bool {
        matches!(self, QueueItem::Flush)
    }

    pub(crate) fn byte_size(&self) -> usize {
        match self {
            QueueItem::Packet(packet) => packet.size(),
            _ => 0,
        }
    }

    pub(crate) fn duration(&self) -> i64 {
        match self {
            QueueItem::Packet(packet) => packet.duration,
            _ => 0,
        }
    }
}

/// 出队的结果
#[derive(Debug)]
pub enum Dequeued {
    Item { item: QueueItem, serial: Serial },
    /// 非阻塞模式下队列为空
    Empty,
    Aborted,
}
