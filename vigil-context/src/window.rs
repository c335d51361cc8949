//! Budgeted context window and its audit trail

use crate::tokens::estimate_tokens;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// One admitted signal, already formatted for the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBlock {
    pub name: String,
    /// `"Metric: <data>\n"`
    pub text: String,
    pub tokens: usize,
    pub important: bool,
}

/// Action taken during context assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyAction {
    /// Block was admitted
    Include,
    /// Block was dropped
    Exclude,
}

/// Decision made during context assembly for audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDecision {
    pub timestamp: DateTime<Utc>,
    pub action: AssemblyAction,
    pub signal: String,
    pub reason: String,
    /// Tokens charged to the budget by this decision
    pub tokens_affected: usize,
}

/// Budget and admission policy shared by every window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub max_tokens: usize,
    pub baseline_tokens: usize,
    pub important: HashSet<String>,
}

impl BudgetPolicy {
    pub fn new(
        max_tokens: usize,
        baseline_tokens: usize,
        important: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            max_tokens,
            baseline_tokens,
            important: important.into_iter().collect(),
        }
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.important.contains(name)
    }
}

/// Assembled context: important blocks first, then the rest in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub assembled_at: DateTime<Utc>,
    pub max_tokens: usize,
    pub used_tokens: usize,
    blocks: VecDeque<SignalBlock>,
    pub assembly_trace: Vec<AssemblyDecision>,
}

impl ContextWindow {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            assembled_at: Utc::now(),
            max_tokens,
            used_tokens: 0,
            blocks: VecDeque::new(),
            assembly_trace: Vec::new(),
        }
    }

    /// Whether a non-important signal would be refused before its data is seen.
    pub fn is_saturated(&self) -> bool {
        self.used_tokens >= self.max_tokens
    }

    /// Record that a signal was dropped without being offered.
    pub fn skip(&mut self, signal: &str, reason: impl Into<String>) {
        self.exclude(signal, reason.into());
    }

    /// Offer fetched data for `name`. Returns whether it was admitted.
    ///
    /// Important signals are always admitted (and may push usage past the
    /// ceiling) and go to the front; others are admitted only while they fit
    /// and go to the back.
    pub fn offer(&mut self, policy: &BudgetPolicy, name: &str, data: &str) -> bool {
        if data.is_empty() {
            self.exclude(name, "No data in range".to_string());
            return false;
        }

        let important = policy.is_important(name);

        if !important && self.is_saturated() {
            self.exclude(name, "No budget remaining".to_string());
            return false;
        }

        let text = format!("Metric: {}\n", data);
        let tokens = estimate_tokens(&text, policy.baseline_tokens);

        if !important && self.used_tokens + tokens > self.max_tokens {
            self.exclude(
                name,
                format!(
                    "Exceeds budget: needs {} tokens, only {} available",
                    tokens,
                    self.remaining_tokens()
                ),
            );
            return false;
        }

        self.used_tokens += tokens;
        self.assembly_trace.push(AssemblyDecision {
            timestamp: Utc::now(),
            action: AssemblyAction::Include,
            signal: name.to_string(),
            reason: if important {
                "Important signal".to_string()
            } else {
                "Fits within budget".to_string()
            },
            tokens_affected: tokens,
        });

        let block = SignalBlock {
            name: name.to_string(),
            text,
            tokens,
            important,
        };
        if important {
            self.blocks.push_front(block);
        } else {
            self.blocks.push_back(block);
        }
        true
    }

    fn exclude(&mut self, signal: &str, reason: String) {
        self.assembly_trace.push(AssemblyDecision {
            timestamp: Utc::now(),
            action: AssemblyAction::Exclude,
            signal: signal.to_string(),
            reason,
            tokens_affected: 0,
        });
    }

    pub fn remaining_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.used_tokens)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &SignalBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }

    /// Blocks concatenated in order; each already ends with a newline.
    pub fn as_text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }
}

impl std::fmt::Display for ContextWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: usize) -> BudgetPolicy {
        BudgetPolicy::new(max, 100, vec!["machine_cpu_cores".to_string()])
    }

    #[test]
    fn test_empty_data_is_skipped() {
        let mut w = ContextWindow::new(1000);
        assert!(!w.offer(&policy(1000), "a", ""));
        assert!(w.is_empty());
        assert_eq!(w.assembly_trace[0].action, AssemblyAction::Exclude);
    }

    #[test]
    fn test_block_format_and_cost() {
        let mut w = ContextWindow::new(1000);
        assert!(w.offer(&policy(1000), "a", "X"));
        assert_eq!(w.as_text(), "Metric: X\n");
        // "Metric: X\n" is 10 bytes -> 100 + 3
        assert_eq!(w.used_tokens, 103);
    }

    #[test]
    fn test_important_prepended_normal_appended() {
        let p = policy(10_000);
        let mut w = ContextWindow::new(10_000);
        w.offer(&p, "a", "1");
        w.offer(&p, "machine_cpu_cores", "8");
        w.offer(&p, "b", "2");
        assert_eq!(w.signal_names(), vec!["machine_cpu_cores", "a", "b"]);
    }

    #[test]
    fn test_normal_signal_over_budget_dropped() {
        let p = policy(150);
        let mut w = ContextWindow::new(150);
        assert!(w.offer(&p, "a", "x"));
        assert!(!w.offer(&p, "b", "y"));
        assert_eq!(w.signal_names(), vec!["a"]);
    }

    #[test]
    fn test_important_admitted_past_ceiling() {
        let p = policy(150);
        let mut w = ContextWindow::new(150);
        w.offer(&p, "a", "x");
        assert!(w.offer(&p, "machine_cpu_cores", "8"));
        assert!(w.used_tokens > w.max_tokens);
        assert!(w.is_saturated());
        assert!(!w.offer(&p, "c", "z"));
    }
}
