//! 沙箱執行器
//!
//! 每次調用在獨佔的臨時工作目錄內生成一個解釋器子進程（自成進程組），
//! 超時即對整個進程組發送 SIGKILL。工作目錄在所有退出路徑上都會被
//! 刪除（`TempDir` 離開作用域即清理）。

use std::process::Stdio;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::limits::validate_scoring_input;
use super::protocol::{bounded_excerpt, ExecutionRequest, ScoringErrorKind, ScoringOutcome};
use crate::config::SandboxConfig;
use crate::domain_types::{AlignedSeries, ScoreMap, ScorePayload};

/// 評分代碼與輸入/輸出的約定檔名
const SCRIPT_FILE: &str = "scoring.py";
const INPUT_FILE: &str = "input.json";
const OUTPUT_FILE: &str = "output.json";

/// 內部執行結果：成功解析的分數或已分類的失敗
enum Evaluated {
    Scores(ScoreMap),
    Failed(ScoringOutcome),
}

/// 評分沙箱
///
/// 同步語義的單次阻塞調用，帶顯式時間預算；呼叫端的迴圈保持
/// 單純的順序控制流。
pub struct ScoringSandbox {
    cfg: SandboxConfig,
}

impl ScoringSandbox {
    pub fn new(cfg: SandboxConfig) -> Self {
        Self { cfg }
    }

    /// 對整段對齊歷史執行評分程序
    ///
    /// 永遠回傳結構化結果；內部失敗一律折疊為
    /// `errorKind = exception`，不向外拋出。
    pub async fn evaluate(
        &self,
        code: Option<&str>,
        params: &Value,
        aligned: &AlignedSeries,
    ) -> (ScoringOutcome, Option<ScoreMap>) {
        let Some(code) = code else {
            return (ScoringOutcome::not_requested(), None);
        };

        // 結構驗證必須在任何子進程生成之前完成
        if let Err(violation) = validate_scoring_input(code, params, &self.cfg) {
            warn!(%violation, "評分輸入未通過結構驗證");
            return (
                ScoringOutcome::failure(
                    ScoringErrorKind::Validation,
                    false,
                    violation.to_string(),
                    None,
                ),
                None,
            );
        }

        match self.run_isolated(code, params, aligned).await {
            Ok(Evaluated::Scores(map)) => (ScoringOutcome::success(), Some(map)),
            Ok(Evaluated::Failed(outcome)) => (outcome, None),
            Err(e) => (
                ScoringOutcome::failure(
                    ScoringErrorKind::Exception,
                    false,
                    format!("評分調用發生內部錯誤: {:#}", e),
                    None,
                ),
                None,
            ),
        }
    }

    async fn run_isolated(
        &self,
        code: &str,
        params: &Value,
        aligned: &AlignedSeries,
    ) -> Result<Evaluated> {
        // 獨佔工作目錄，離開作用域即刪除（含所有退出路徑）
        let workdir = tempfile::Builder::new()
            .prefix("portsim-scoring-")
            .tempdir()
            .context("無法建立沙箱工作目錄")?;

        std::fs::write(workdir.path().join(SCRIPT_FILE), code).context("無法寫入評分代碼")?;
        let request = ExecutionRequest::from_aligned(params.clone(), aligned);
        std::fs::write(
            workdir.path().join(INPUT_FILE),
            serde_json::to_vec(&request).context("無法序列化執行請求")?,
        )
        .context("無法寫入執行請求")?;

        let mut command = Command::new(&self.cfg.interpreter);
        command
            .arg(SCRIPT_FILE)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().context("無法生成評分子進程")?;
        let pid = child.id();
        debug!(?pid, interpreter = %self.cfg.interpreter, "評分子進程已生成");

        let budget = Duration::from_secs(self.cfg.timeout_secs);
        let output = match timeout(budget, child.wait_with_output()).await {
            Ok(waited) => waited.context("等待評分子進程失敗")?,
            Err(_) => {
                // 強制終止整個進程組；子進程本身由 kill_on_drop 兜底
                #[cfg(unix)]
                if let Some(pid) = pid {
                    unsafe {
                        libc::killpg(pid as i32, libc::SIGKILL);
                    }
                }
                warn!(timeout_secs = self.cfg.timeout_secs, "評分子進程超時，已終止進程組");
                return Ok(Evaluated::Failed(ScoringOutcome::failure(
                    ScoringErrorKind::Timeout,
                    true,
                    format!("評分程序超過 {} 秒的時間預算", self.cfg.timeout_secs),
                    None,
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(Evaluated::Failed(ScoringOutcome::failure(
                ScoringErrorKind::Runtime,
                true,
                format!("評分程序以非零狀態退出: {}", output.status),
                bounded_excerpt(&stderr, self.cfg.excerpt_chars),
            )));
        }

        // 優先讀取 output.json，缺失時退回標準輸出
        let raw = match std::fs::read_to_string(workdir.path().join(OUTPUT_FILE)) {
            Ok(contents) => contents,
            Err(_) => String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        let parsed = ScorePayload::from_json(&raw)
            .and_then(|payload| payload.normalize(aligned.latest_date()));
        match parsed {
            Ok(map) => {
                debug!(signal_dates = map.signal_date_count(), "評分輸出解析完成");
                Ok(Evaluated::Scores(map))
            }
            Err(e) => Ok(Evaluated::Failed(ScoringOutcome::failure(
                ScoringErrorKind::Output,
                true,
                e.to_string(),
                bounded_excerpt(&raw, self.cfg.excerpt_chars),
            ))),
        }
    }
}
