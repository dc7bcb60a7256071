//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for [`super::RuntimeConfig`].
///
/// Maintained manually to match the struct hierarchy in `mod.rs`. Any new
/// field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [fusion]
        "fusion",
        "fusion.enable_temporal_analysis",
        "fusion.enable_quality_assessment",
        "fusion.max_history",
        "fusion.fusion_thresholds",
        "fusion.fusion_thresholds.human",
        "fusion.fusion_thresholds.environmental",
        "fusion.fusion_thresholds.situational",
        // [stream]
        "stream",
        "stream.sample_rate_hz",
        "stream.buffer_size",
        "stream.window_ms",
        "stream.enable_memory_optimization",
        "stream.enable_adaptive_batching",
        // [session]
        "session",
        "session.auto_reconnect",
        "session.reconnect_interval_ms",
        "session.max_reconnect_attempts",
        "session.backoff_multiplier",
        "session.max_interval_ms",
        "session.mock_mode",
        "session.heartbeat_interval_ms",
        "session.connect_timeout_ms",
        "session.frame_read_timeout_ms",
        // [sync]
        "sync",
        "sync.tolerance_ms",
        "sync.strategy",
        "sync.buffer_size",
        // [distributor]
        "distributor",
        "distributor.max_clients",
        "distributor.compression",
        "distributor.per_subscriber_highwatermark",
        // [batcher]
        "batcher",
        "batcher.base_interval_ms",
        "batcher.max_batch_size",
        "batcher.target_latency_ms",
        // [discovery]
        "discovery",
        "discovery.service_name",
        "discovery.window_secs",
        "discovery.lost_after_secs",
        "discovery.mock_mode",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            if let Some((_, best_dist)) = best {
                if dist < best_dist {
                    best = Some((k, dist));
                }
            } else {
                best = Some((k, dist));
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys — it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn levenshtein_one_edit() {
        assert_eq!(levenshtein("tolerence_ms", "tolerance_ms"), 1);
    }

    #[test]
    fn levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn walk_toml_keys_flat() {
        let toml: toml::Value = r#"
            a = 1
            b = "hello"
        "#
        .parse()
        .expect("valid toml");
        let mut keys = walk_toml_keys(&toml, "");
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [sync]
            tolerance_ms = 10
        "#
        .parse()
        .expect("valid toml");
        let mut keys = walk_toml_keys(&toml, "");
        keys.sort();
        assert_eq!(
            keys,
            vec!["sync".to_string(), "sync.tolerance_ms".to_string()]
        );
    }

    #[test]
    fn typo_in_sync_section_is_flagged_with_suggestion() {
        let toml_str = r#"
            [sync]
            tolerence_ms = 25
        "#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "sync.tolerence_ms");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("sync.tolerance_ms")
        );
    }

    #[test]
    fn valid_config_produces_zero_warnings() {
        let toml_str = r#"
            [sync]
            tolerance_ms = 25
            strategy = "arrival_time"

            [distributor]
            max_clients = 8
        "#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }
}
