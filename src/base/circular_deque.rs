/// 固定容量的环形双端队列
///
/// 用于渲染端缓存已解码的音频块/视频帧。front 与 rear 相等时既可能是空也可能是满，
/// 由 `empty` / `full` 两个标志区分。
#[derive(Debug)]
pub struct CircularDeque<T> {
    slots: Vec<Option<T>>,
    front: usize,
    /// 下一个写入位置（最后一个元素之后）
    rear: usize,
    empty: bool,
    full: bool,
}

impl<T> CircularDeque<T> {
    /// `capacity` 为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            front: 0,
            rear: 0,
            empty: true,
            full: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn prev(&self, index: usize) -> usize {
        (index + self.capacity() - 1) % self.capacity()
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    /// 队首插入；已满时返回 false
    pub fn insert_front(&mut self, value: T) -> bool {
        if self.full {
            return false;
        }
        self.front = self.prev(self.front);
        self.slots[self.front] = Some(value);
        self.empty = false;
        self.full = self.front == self.rear;
        true
    }

    /// 队尾插入；已满时返回 false
    pub fn insert_last(&mut self, value: T) -> bool {
        if self.full {
            return false;
        }
        self.slots[self.rear] = Some(value);
        self.rear = self.next(self.rear);
        self.empty = false;
        self.full = self.front == self.rear;
        true
    }

    pub fn delete_front(&mut self) -> bool {
        self.pop_front().is_some()
    }

    pub fn delete_last(&mut self) -> bool {
        self.pop_last().is_some()
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.empty {
            return None;
        }
        let value = self.slots[self.front].take();
        self.front = self.next(self.front);
        self.full = false;
        self.empty = self.front == self.rear;
        value
    }

    pub fn pop_last(&mut self) -> Option<T> {
        if self.empty {
            return None;
        }
        self.rear = self.prev(self.rear);
        let value = self.slots[self.rear].take();
        self.full = false;
        self.empty = self.front == self.rear;
        value
    }

    pub fn front(&self) -> Option<&T> {
        if self.empty {
            return None;
        }
        self.slots[self.front].as_ref()
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        if self.empty {
            return None;
        }
        self.slots[self.front].as_mut()
    }

    pub fn rear(&self) -> Option<&T> {
        if self.empty {
            return None;
        }
        self.slots[self.prev(self.rear)].as_ref()
    }

    /// 第 `index` 个元素（0 为队首）
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.slots[(self.front + index) % self.capacity()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        if self.empty {
            0
        } else if self.full {
            self.capacity()
        } else {
            (self.rear + self.capacity() - self.front) % self.capacity()
        }
    }

    /// 只保留满足 `keep` 的元素，顺序不变
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        for _ in 0..self.len() {
            if let Some(value) = self.pop_front() {
                if keep(&value) {
                    self.insert_last(value);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.front = 0;
        self.rear = 0;
        self.empty = true;
        self.full = false;
    }
}
