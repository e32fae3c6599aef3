// 线程与调度基础设施

pub mod circular_deque;
pub mod message_loop;
pub mod message_queue;
pub mod task_runner;
pub mod time;

pub use circular_deque::CircularDeque;
pub use message_loop::{LoopState, MessageLoop};
pub use message_queue::TaskClosure;
pub use task_runner::TaskRunner;
