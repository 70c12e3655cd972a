//! 会话不活动计时器
//!
//! 空闲超时登出的显式实现：计时器是会话组件持有的对象，由既定的
//! 活动信号集合重置，登出路径可确定性拆除。不依赖任何进程级全局
//! 计时器状态。

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// 会重置计时器的活动信号集合
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivitySignal {
    /// 页面跳转
    Navigation,
    /// 用户交互（点击/输入）
    Interaction,
    /// 后端调用
    ApiCall,
}

/// 不活动计时器：静默满 `timeout` 后触发一次 `on_expire`
pub struct InactivityTimer {
    reset_tx: watch::Sender<u64>,
    handle: JoinHandle<()>,
}

impl InactivityTimer {
    /// 启动计时器任务。过期回调至多触发一次。
    pub fn spawn<F>(timeout: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (reset_tx, mut reset_rx) = watch::channel(0u64);

        let handle = tokio::spawn(async move {
            let mut on_expire = Some(on_expire);
            loop {
                let sleep = tokio::time::sleep(timeout);
                tokio::pin!(sleep);
                tokio::select! {
                    _ = &mut sleep => {
                        if let Some(callback) = on_expire.take() {
                            debug!("会话空闲超时，触发过期回调");
                            callback();
                        }
                        break;
                    }
                    changed = reset_rx.changed() => {
                        match changed {
                            // 活动信号：丢弃旧睡眠，重新计时
                            Ok(()) => continue,
                            // 发送端已销毁：任务退出
                            Err(_) => break,
                        }
                    }
                }
            }
        });

        Self { reset_tx, handle }
    }

    /// 记录一次活动，把过期时刻推后整个超时窗口
    pub fn record_activity(&self, signal: ActivitySignal) {
        debug!("会话活动信号: {:?}", signal);
        self.reset_tx.send_modify(|generation| *generation += 1);
    }

    /// 确定性拆除（登出路径）；幂等，之后过期回调不会再触发
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
