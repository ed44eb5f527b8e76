// 進度事件模組
//
// 模擬引擎每個模擬日恰好發佈一次進度事件，按日期嚴格遞增；
// 核心對傳輸方式保持中立，下游透過 `ProgressSink` 邊界接收。

pub mod types;

pub use types::{ChannelProgressSink, LogProgressSink, ProgressEvent, ProgressSink};
