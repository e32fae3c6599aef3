use crate::core::{log_ctx, PlayerConfig, PlayerError, Result};
use crate::player::media_player::{MediaPlayer, RendererSinks};
use log::info;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// 进程级播放器登记表
///
/// 由宿主程序创建并持有，`init` 之后才能登记播放器，
/// `shutdown` 停止并释放所有播放器。
#[derive(Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<u64, Arc<MediaPlayer>>>,
    next_id: AtomicU64,
    initialized: AtomicBool,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self) {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!("{} 📋 播放器登记表已初始化", log_ctx());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// 登记一个已创建的播放器，返回其 id
    pub fn register(&self, player: Arc<MediaPlayer>) -> Result<u64> {
        if !self.is_initialized() {
            return Err(PlayerError::StateError("登记表未初始化".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.players.lock().insert(id, player);
        info!("{} ➕ 登记播放器 #{}", log_ctx(), id);
        Ok(id)
    }

    /// 创建并登记
    pub fn create(&self, config: PlayerConfig, sinks: RendererSinks) -> Result<(u64, Arc<MediaPlayer>)> {
        if !self.is_initialized() {
            return Err(PlayerError::StateError("登记表未初始化".into()));
        }
        let player = Arc::new(MediaPlayer::new(config, sinks)?);
        let id = self.register(player.clone())?;
        Ok((id, player))
    }

    pub fn get(&self, id: u64) -> Option<Arc<MediaPlayer>> {
        self.players.lock().get(&id).cloned()
    }

    /// 注销并停止播放器
    pub fn unregister(&self, id: u64) -> Option<Arc<MediaPlayer>> {
        let player = self.players.lock().remove(&id)?;
        player.stop();
        info!("{} ➖ 注销播放器 #{}", log_ctx(), id);
        Some(player)
    }

    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.players.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 停止所有播放器并清空；之后需要重新 `init`
    pub fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        let players: Vec<(u64, Arc<MediaPlayer>)> = self.players.lock().drain().collect();
        for (id, player) in &players {
            player.release();
            info!("{} 🛑 播放器 #{} 已释放", log_ctx(), id);
        }
        info!("{} 📋 登记表已关闭（{} 个播放器）", log_ctx(), players.len());
    }
}

impl Drop for PlayerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
