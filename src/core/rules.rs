//! Priority classes, rule parsing, and the shared rule set.
//!
//! Rules map a normalized executable name to target CPU/IO scheduling
//! classes. The active set is read by the enforcer sweep and written by
//! `add_rule`/`remove_rule` at any time; a single-writer/many-reader lock
//! guarantees an individual rule is never observed half-updated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use super::config::RuleConfig;

// ============================================================================
// Priority Classes
// ============================================================================

/// CPU scheduling class, ordered from least to most favored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuPriority {
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl fmt::Display for CpuPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuPriority::Idle => write!(f, "Idle"),
            CpuPriority::BelowNormal => write!(f, "BelowNormal"),
            CpuPriority::Normal => write!(f, "Normal"),
            CpuPriority::AboveNormal => write!(f, "AboveNormal"),
            CpuPriority::High => write!(f, "High"),
            CpuPriority::Realtime => write!(f, "Realtime"),
        }
    }
}

/// IO scheduling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoPriority {
    VeryLow,
    Low,
    Normal,
    High,
}

impl fmt::Display for IoPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoPriority::VeryLow => write!(f, "VeryLow"),
            IoPriority::Low => write!(f, "Low"),
            IoPriority::Normal => write!(f, "Normal"),
            IoPriority::High => write!(f, "High"),
        }
    }
}

/// A priority name from configuration did not match any known class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedPriority(pub String);

impl fmt::Display for UnrecognizedPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized priority name: {:?}", self.0)
    }
}

impl std::error::Error for UnrecognizedPriority {}

impl FromStr for CpuPriority {
    type Err = UnrecognizedPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(CpuPriority::Idle),
            "belownormal" | "below_normal" | "below normal" => Ok(CpuPriority::BelowNormal),
            "normal" => Ok(CpuPriority::Normal),
            "abovenormal" | "above_normal" | "above normal" => Ok(CpuPriority::AboveNormal),
            "high" => Ok(CpuPriority::High),
            "realtime" | "real_time" | "real time" => Ok(CpuPriority::Realtime),
            _ => Err(UnrecognizedPriority(s.to_string())),
        }
    }
}

impl FromStr for IoPriority {
    type Err = UnrecognizedPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verylow" | "very_low" | "very low" => Ok(IoPriority::VeryLow),
            "low" => Ok(IoPriority::Low),
            "normal" => Ok(IoPriority::Normal),
            "high" => Ok(IoPriority::High),
            _ => Err(UnrecognizedPriority(s.to_string())),
        }
    }
}

/// Parse a CPU priority name, case-insensitively.
pub fn parse_priority(name: &str) -> Result<CpuPriority, UnrecognizedPriority> {
    name.parse()
}

/// Parse an IO priority name, case-insensitively.
pub fn parse_io_priority(name: &str) -> Result<IoPriority, UnrecognizedPriority> {
    name.parse()
}

// ============================================================================
// Rules
// ============================================================================

/// Normalize an executable name into a rule-set key: lower-cased, with a
/// trailing `.exe` stripped. `GAME.EXE`, `game.exe` and `game` all map to
/// the same key; matching is otherwise exact (no prefixes or wildcards).
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    lower
        .strip_suffix(".exe")
        .map(str::to_string)
        .unwrap_or(lower)
}

/// Runtime form of a configured rule, after priority parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRule {
    /// Normalized process name (the rule-set key)
    pub process_name: String,
    pub cpu: CpuPriority,
    pub io: IoPriority,
}

impl ActiveRule {
    pub fn new(process_name: &str, cpu: CpuPriority, io: IoPriority) -> Self {
        Self {
            process_name: normalize_process_name(process_name),
            cpu,
            io,
        }
    }

    /// Parse a configured rule into its runtime form.
    pub fn from_config(rule: &RuleConfig) -> Result<Self, UnrecognizedPriority> {
        Ok(Self::new(
            &rule.process_name,
            parse_priority(&rule.cpu_priority)?,
            parse_io_priority(&rule.io_priority)?,
        ))
    }
}

/// The shared active rule set: normalized name -> rule.
///
/// Cloned handles share one map. Writes take the exclusive lock briefly;
/// the sweep takes the shared lock once per process lookup and clones the
/// entry out, so no rule is ever read mid-update.
#[derive(Clone, Default)]
pub struct RuleSet {
    inner: Arc<RwLock<HashMap<String, ActiveRule>>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the rule for its process name. The last
    /// registration for a given name wins.
    pub fn insert(&self, rule: ActiveRule) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(rule.process_name.clone(), rule);
    }

    /// Remove the rule for a process name (accepts unnormalized input).
    /// Returns the removed rule, if any.
    pub fn remove(&self, process_name: &str) -> Option<ActiveRule> {
        let key = normalize_process_name(process_name);
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&key)
    }

    /// Look up the rule matching a raw process name.
    pub fn matching(&self, raw_name: &str) -> Option<ActiveRule> {
        let key = normalize_process_name(raw_name);
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority_case_insensitive() {
        assert_eq!(parse_priority("realtime").unwrap(), CpuPriority::Realtime);
        assert_eq!(parse_priority("Realtime").unwrap(), CpuPriority::Realtime);
        assert_eq!(parse_priority("HIGH").unwrap(), CpuPriority::High);
        assert_eq!(
            parse_priority("belownormal").unwrap(),
            CpuPriority::BelowNormal
        );
        assert_eq!(
            parse_priority("Below Normal").unwrap(),
            CpuPriority::BelowNormal
        );
    }

    #[test]
    fn test_parse_priority_unrecognized() {
        let err = parse_priority("bogus").unwrap_err();
        assert_eq!(err, UnrecognizedPriority("bogus".to_string()));
        assert!(parse_io_priority("turbo").is_err());
    }

    #[test]
    fn test_parse_io_priority() {
        assert_eq!(parse_io_priority("verylow").unwrap(), IoPriority::VeryLow);
        assert_eq!(parse_io_priority("Very Low").unwrap(), IoPriority::VeryLow);
        assert_eq!(parse_io_priority("High").unwrap(), IoPriority::High);
    }

    #[test]
    fn test_normalize_process_name() {
        assert_eq!(normalize_process_name("GAME.EXE"), "game");
        assert_eq!(normalize_process_name("game.exe"), "game");
        assert_eq!(normalize_process_name("game"), "game");
        assert_eq!(normalize_process_name("  Notepad.exe "), "notepad");
        // Only the .exe extension is stripped.
        assert_eq!(normalize_process_name("backup.sh"), "backup.sh");
    }

    #[test]
    fn test_rule_set_case_insensitive_lookup() {
        let rules = RuleSet::new();
        rules.insert(ActiveRule::new(
            "game.exe",
            CpuPriority::High,
            IoPriority::High,
        ));

        let rule = rules.matching("GAME.EXE").expect("rule should match");
        assert_eq!(rule.cpu, CpuPriority::High);
        assert_eq!(rule.io, IoPriority::High);
        assert!(rules.matching("other.exe").is_none());
    }

    #[test]
    fn test_rule_set_last_write_wins() {
        let rules = RuleSet::new();
        rules.insert(ActiveRule::new(
            "game.exe",
            CpuPriority::Normal,
            IoPriority::Normal,
        ));
        rules.insert(ActiveRule::new(
            "GAME.EXE",
            CpuPriority::High,
            IoPriority::High,
        ));

        assert_eq!(rules.len(), 1);
        let rule = rules.matching("game").unwrap();
        assert_eq!(rule.cpu, CpuPriority::High);
    }

    #[test]
    fn test_rule_set_remove() {
        let rules = RuleSet::new();
        rules.insert(ActiveRule::new(
            "game.exe",
            CpuPriority::High,
            IoPriority::High,
        ));

        assert!(rules.remove("GAME.EXE").is_some());
        assert!(rules.matching("game.exe").is_none());
        assert!(rules.remove("game.exe").is_none());
    }

    #[test]
    fn test_active_rule_from_config() {
        let config = RuleConfig {
            process_name: "Notepad.exe".to_string(),
            cpu_priority: "high".to_string(),
            io_priority: "normal".to_string(),
            enabled: true,
        };
        let rule = ActiveRule::from_config(&config).unwrap();
        assert_eq!(rule.process_name, "notepad");
        assert_eq!(rule.cpu, CpuPriority::High);
        assert_eq!(rule.io, IoPriority::Normal);

        let bad = RuleConfig {
            cpu_priority: "hyper".to_string(),
            ..config
        };
        assert!(ActiveRule::from_config(&bad).is_err());
    }
}
