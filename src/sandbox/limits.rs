//! 評分輸入的結構限制
//!
//! 在生成任何子進程之前檢查：評分代碼大小、頂層參數鍵數量、鍵長度，
//! 以及對嵌套參數結構的有界深度/節點數走訪。超深或超大的參數負載
//! 在此被拒絕。

use serde_json::Value;
use thiserror::Error;

use crate::config::SandboxConfig;

/// 結構限制違規
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LimitViolation {
    #[error("評分代碼過大: {size} 位元組，上限 {max}")]
    CodeTooLarge { size: usize, max: usize },

    #[error("頂層參數鍵過多: {count}，上限 {max}")]
    TooManyKeys { count: usize, max: usize },

    #[error("參數鍵過長: '{key}'，上限 {max} 位元組")]
    KeyTooLong { key: String, max: usize },

    #[error("參數結構嵌套過深，上限 {max}")]
    TooDeep { max: usize },

    #[error("參數結構節點過多，上限 {max}")]
    TooManyNodes { max: usize },
}

/// 驗證評分代碼與參數的結構限制
pub fn validate_scoring_input(
    code: &str,
    params: &Value,
    cfg: &SandboxConfig,
) -> Result<(), LimitViolation> {
    if code.len() > cfg.max_code_bytes {
        return Err(LimitViolation::CodeTooLarge {
            size: code.len(),
            max: cfg.max_code_bytes,
        });
    }

    if let Value::Object(map) = params {
        if map.len() > cfg.max_param_keys {
            return Err(LimitViolation::TooManyKeys {
                count: map.len(),
                max: cfg.max_param_keys,
            });
        }
    }

    let mut nodes = 0usize;
    walk(params, 1, cfg, &mut nodes)
}

/// 深度優先走訪，同時計數節點並檢查鍵長
fn walk(
    value: &Value,
    depth: usize,
    cfg: &SandboxConfig,
    nodes: &mut usize,
) -> Result<(), LimitViolation> {
    *nodes += 1;
    if *nodes > cfg.max_param_nodes {
        return Err(LimitViolation::TooManyNodes {
            max: cfg.max_param_nodes,
        });
    }
    // 深度只對容器計層，純量葉節點不另起一層
    if value.is_object() || value.is_array() {
        if depth > cfg.max_param_depth {
            return Err(LimitViolation::TooDeep {
                max: cfg.max_param_depth,
            });
        }
    }

    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if key.len() > cfg.max_key_bytes {
                    return Err(LimitViolation::KeyTooLong {
                        key: key.chars().take(32).collect(),
                        max: cfg.max_key_bytes,
                    });
                }
                walk(inner, depth + 1, cfg, nodes)?;
            }
        }
        Value::Array(items) => {
            for inner in items {
                walk(inner, depth + 1, cfg, nodes)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn cfg() -> SandboxConfig {
        SandboxConfig::default()
    }

    /// 建立嵌套到指定深度的參數結構
    fn nested(depth: usize) -> Value {
        let mut value = json!(1);
        for _ in 0..depth {
            value = json!({ "inner": value });
        }
        value
    }

    #[test]
    fn test_reasonable_params_pass() {
        let params = json!({"lookback": 20, "weights": [0.5, 0.5], "mode": "momentum"});
        assert!(validate_scoring_input("score = 1", &params, &cfg()).is_ok());
    }

    #[test]
    fn test_depth_nine_rejected_with_ceiling_eight() {
        // 深度 8 通過，深度 9 必須在任何子進程生成前被拒絕
        assert!(validate_scoring_input("x", &nested(8), &cfg()).is_ok());
        assert_matches!(
            validate_scoring_input("x", &nested(9), &cfg()),
            Err(LimitViolation::TooDeep { max: 8 })
        );
    }

    #[test]
    fn test_oversized_code_rejected() {
        let code = "x".repeat(cfg().max_code_bytes + 1);
        assert_matches!(
            validate_scoring_input(&code, &json!({}), &cfg()),
            Err(LimitViolation::CodeTooLarge { .. })
        );
    }

    #[test]
    fn test_too_many_top_level_keys_rejected() {
        let mut map = serde_json::Map::new();
        for i in 0..101 {
            map.insert(format!("k{}", i), json!(i));
        }
        assert_matches!(
            validate_scoring_input("x", &Value::Object(map), &cfg()),
            Err(LimitViolation::TooManyKeys { .. })
        );
    }

    #[test]
    fn test_long_key_rejected() {
        let params = json!({ "k".repeat(129): 1 });
        assert_matches!(
            validate_scoring_input("x", &params, &cfg()),
            Err(LimitViolation::KeyTooLong { .. })
        );
    }

    #[test]
    fn test_huge_node_count_rejected() {
        let items: Vec<Value> = (0..10_001).map(|i| json!(i)).collect();
        assert_matches!(
            validate_scoring_input("x", &Value::Array(items), &cfg()),
            Err(LimitViolation::TooManyNodes { .. })
        );
    }
}
