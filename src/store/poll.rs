use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use super::{Dispatcher, Intent};

/// 一個執行中的輪詢計時器。丟棄或呼叫 `stop` 時停止排程。
///
/// 已經送出的請求仍會完成，結果照常回報給 store（若 store 還在）。
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 立即列出一次集合，之後每隔 `every` 再列出一次。
///
/// 不做去重：慢的回應可能與下一次排程重疊，最後完成的結果生效。
/// store 被丟棄後計時器會自行結束。
pub fn spawn_poller(dispatcher: Dispatcher, every: Duration) -> PollHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if dispatcher.is_closed() {
                debug!("poller stopping: store is gone");
                break;
            }
            dispatcher.dispatch(Intent::List);
        }
    });
    PollHandle { task }
}
