//! 处理池的任务队列状态
//!
//! 队列状态划分为几个命名的互斥区域，锁的嵌套顺序固定为
//! 装载锁 ⊃ 批量认领锁 ⊃ 认领锁 ⊃ 运行集锁，任何路径都不得逆序：
//!
//! * 认领锁：待处理队列 + 疑似重复集。单元的取出与重复判定在此完成。
//! * 批量认领锁：串行化一次批量认领，批内逐个走认领锁。
//! * 装载锁：串行化补充装载，持锁期间可能休眠。
//! * 运行集：正在执行的单元。认领成功即登记，避免"取出未登记"的
//!   窗口让排空判定提前通过。
//!
//! 排空（待处理与运行集同时为空）通过 `Notify` 通知等待方，等待方
//! 醒来后重新校验谓词。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard, Notify};

struct ClaimState<T> {
    pending: VecDeque<T>,
    /// 上一轮装载快照里正在运行的单元，认领时用于跨代重复抑制
    maybe_repeat: Vec<T>,
}

/// 处理池共享的队列状态
pub struct WorkQueues<T> {
    claim: Mutex<ClaimState<T>>,
    batch_gate: Mutex<()>,
    load_gate: Mutex<()>,
    running: Mutex<Vec<T>>,
    /// 装载线程正处于空闲休眠
    sleeping: AtomicBool,
    drained: Notify,
}

impl<T: Clone> WorkQueues<T> {
    pub fn new() -> Self {
        Self {
            claim: Mutex::new(ClaimState {
                pending: VecDeque::new(),
                maybe_repeat: Vec::new(),
            }),
            batch_gate: Mutex::new(()),
            load_gate: Mutex::new(()),
            running: Mutex::new(Vec::new()),
            sleeping: AtomicBool::new(false),
            drained: Notify::new(),
        }
    }

    /// 认领一个任务单元并登记到运行集
    ///
    /// 命中疑似重复集的候选被丢弃（该单元可能仍在执行，下一轮装载
    /// 会再次取到它），对应的疑似记录同时消除，保证至多抑制一次。
    pub async fn claim_one(&self, mut is_same: impl FnMut(&T, &T) -> bool) -> Option<T> {
        let mut state = self.claim.lock().await;
        while let Some(candidate) = state.pending.pop_front() {
            if let Some(pos) = state
                .maybe_repeat
                .iter()
                .position(|seen| is_same(&candidate, seen))
            {
                state.maybe_repeat.remove(pos);
                continue;
            }
            self.running.lock().await.push(candidate.clone());
            return Some(candidate);
        }
        None
    }

    /// 批量认领至多 `limit` 个任务单元，整批登记到运行集
    pub async fn claim_batch(&self, limit: usize, mut is_same: impl FnMut(&T, &T) -> bool) -> Vec<T> {
        let _gate = self.batch_gate.lock().await;
        let mut batch = Vec::new();
        while batch.len() < limit {
            match self.claim_one(&mut is_same).await {
                Some(unit) => batch.push(unit),
                None => break,
            }
        }
        batch
    }

    /// 追加待处理单元（由装载流程调用）
    pub async fn push_pending(&self, units: Vec<T>) {
        let mut state = self.claim.lock().await;
        state.pending.extend(units);
    }

    pub async fn pending_len(&self) -> usize {
        self.claim.lock().await.pending.len()
    }

    /// 丢弃全部待处理单元，运行中的不受影响
    pub async fn clear_pending(&self) {
        self.claim.lock().await.pending.clear();
        self.drained.notify_waiters();
    }

    /// 把运行集快照写入疑似重复集（装载新一批之前调用）
    pub async fn snapshot_running_as_repeat(&self) {
        let mut state = self.claim.lock().await;
        let running = self.running.lock().await;
        state.maybe_repeat.clear();
        state.maybe_repeat.extend(running.iter().cloned());
    }

    /// 单元执行完毕，从运行集移除（按重复判定等价移除首个匹配）
    pub async fn remove_running(&self, units: &[T], mut is_same: impl FnMut(&T, &T) -> bool) {
        {
            let mut running = self.running.lock().await;
            for unit in units {
                if let Some(pos) = running.iter().position(|r| is_same(unit, r)) {
                    running.remove(pos);
                }
            }
        }
        self.drained.notify_waiters();
    }

    pub async fn running_len(&self) -> usize {
        self.running.lock().await.len()
    }

    /// 待处理队列与运行集是否同时为空
    pub async fn is_drained(&self) -> bool {
        let state = self.claim.lock().await;
        if !state.pending.is_empty() {
            return false;
        }
        self.running.lock().await.is_empty()
    }

    /// 阻塞直到完全排空。先注册通知再校验谓词，避免错过唤醒
    pub async fn wait_until_drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.is_drained().await {
                return;
            }
            notified.await;
        }
    }

    /// 装载锁，持锁方可能在空数据时休眠
    pub async fn lock_load(&self) -> MutexGuard<'_, ()> {
        self.load_gate.lock().await
    }

    pub fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::Release);
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Acquire)
    }
}

impl<T: Clone> Default for WorkQueues<T> {
    fn default() -> Self {
        Self::new()
    }
}
