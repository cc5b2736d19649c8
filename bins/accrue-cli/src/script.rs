//! Operation scripts: a JSON array of timestamped pool operations.
//!
//! ```json
//! [
//!   { "at": 1, "op": "fund", "who": "admin", "amount": 1000 },
//!   { "at": 2, "op": "stake", "who": "alice", "amount": 10 },
//!   { "at": 9, "op": "exit", "who": "alice" }
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use accrue_core::types::{ParticipantId, Timestamp};
use accrue_pool::StakingPool;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Kind of pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Stake,
    Withdraw,
    Claim,
    Exit,
    Fund,
    SetDuration,
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub at: Timestamp,
    pub op: Op,
    pub who: String,
    #[serde(default)]
    pub amount: u64,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub at: Timestamp,
    pub op: Op,
    pub who: String,
    pub ok: bool,
    /// Amount returned by the operation (stake, payout, rate, ...).
    /// For `exit`, the stake withdrawn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    /// Reward paid by an `exit`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read a script from a JSON file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    parse(&raw).with_context(|| format!("Failed to parse script {}", path.display()))
}

/// Parse a script from JSON text.
pub fn parse(raw: &str) -> Result<Vec<Step>> {
    let steps: Vec<Step> = serde_json::from_str(raw)?;
    if let Some(w) = steps.windows(2).find(|w| w[1].at < w[0].at) {
        bail!("steps out of order: t={} follows t={}", w[1].at, w[0].at);
    }
    Ok(steps)
}

/// Labels seen while running a script, for naming report lines.
#[derive(Debug, Default)]
pub struct Labels(BTreeMap<ParticipantId, String>);

impl Labels {
    /// Intern `label`, returning its identity.
    pub fn id(&mut self, label: &str) -> ParticipantId {
        let id = ParticipantId::from_label(label);
        self.0.entry(id).or_insert_with(|| label.to_string());
        id
    }

    /// Label for `id`, or its hex form when unknown.
    pub fn name(&self, id: &ParticipantId) -> String {
        self.0.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// Run `steps` against `pool`.
///
/// A failing step is recorded and the run continues, unless `strict` is set.
pub fn run(
    pool: &StakingPool,
    steps: &[Step],
    labels: &mut Labels,
    strict: bool,
) -> Result<Vec<StepOutcome>> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        let who = labels.id(&step.who);
        let result = match step.op {
            Op::Stake => pool.stake(&who, step.amount, step.at).map(|v| (v, None)),
            Op::Withdraw => pool.withdraw(&who, step.amount, step.at).map(|v| (v, None)),
            Op::Claim => pool.claim(&who, step.at).map(|v| (v, None)),
            Op::Exit => pool.exit(&who, step.at).map(|r| (r.withdrawn, Some(r.paid))),
            Op::Fund => pool
                .fund(&who, step.amount, step.at)
                .map(|plan| (plan.reward_rate, None)),
            Op::SetDuration => pool
                .set_duration(&who, step.amount, step.at)
                .map(|()| (step.amount, None)),
        };

        let outcome = match result {
            Ok((value, paid)) => {
                info!(at = step.at, op = ?step.op, who = %step.who, value, "step ok");
                StepOutcome {
                    at: step.at,
                    op: step.op,
                    who: step.who.clone(),
                    ok: true,
                    value: Some(value),
                    paid,
                    error: None,
                }
            }
            Err(e) => {
                if strict {
                    bail!("step {:?} by {} at t={} failed: {e}", step.op, step.who, step.at);
                }
                warn!(at = step.at, op = ?step.op, who = %step.who, "step failed: {e}");
                StepOutcome {
                    at: step.at,
                    op: step.op,
                    who: step.who.clone(),
                    ok: false,
                    value: None,
                    paid: None,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_pool::PoolConfig;

    fn pool() -> StakingPool {
        StakingPool::new(&PoolConfig {
            duration_secs: 10,
            ..PoolConfig::default()
        })
    }

    #[test]
    fn parse_defaults_amount() {
        let steps = parse(r#"[{"at": 3, "op": "claim", "who": "alice"}]"#).unwrap();
        assert_eq!(steps[0].amount, 0);
        assert_eq!(steps[0].op, Op::Claim);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let raw = br#"[{"at": 1, "op": "exit", "who": "bob"}]"#;
        std::io::Write::write_all(&mut file, raw).unwrap();
        let steps = load(file.path()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].op, Op::Exit);
        assert!(load(Path::new("/nonexistent/ops.json")).is_err());
    }

    #[test]
    fn parse_rejects_unordered() {
        let raw = r#"[
            {"at": 5, "op": "claim", "who": "a"},
            {"at": 4, "op": "claim", "who": "a"}
        ]"#;
        assert!(parse(raw).is_err());
    }

    #[test]
    fn parse_rejects_unknown_op() {
        assert!(parse(r#"[{"at": 1, "op": "mint", "who": "a"}]"#).is_err());
    }

    #[test]
    fn run_records_failures() {
        let raw = r#"[
            {"at": 1, "op": "fund", "who": "admin", "amount": 1000},
            {"at": 2, "op": "stake", "who": "alice", "amount": 10},
            {"at": 3, "op": "withdraw", "who": "alice", "amount": 99},
            {"at": 7, "op": "claim", "who": "alice"}
        ]"#;
        let steps = parse(raw).unwrap();
        let p = pool();
        let mut labels = Labels::default();
        let out = run(&p, &steps, &mut labels, false).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].value, Some(100));
        assert!(!out[2].ok);
        assert!(out[2].error.as_deref().unwrap().contains("insufficient stake"));
        assert_eq!(out[3].value, Some(500));
    }

    #[test]
    fn exit_reports_stake_and_reward_separately() {
        let raw = r#"[
            {"at": 1, "op": "fund", "who": "admin", "amount": 1000},
            {"at": 1, "op": "stake", "who": "alice", "amount": 10},
            {"at": 4, "op": "exit", "who": "alice"}
        ]"#;
        let steps = parse(raw).unwrap();
        let p = pool();
        let mut labels = Labels::default();
        let out = run(&p, &steps, &mut labels, true).unwrap();
        assert_eq!(out[2].value, Some(10));
        assert_eq!(out[2].paid, Some(300));
        assert_eq!(out[1].paid, None);
    }

    #[test]
    fn run_strict_stops_on_failure() {
        let steps = parse(r#"[{"at": 1, "op": "claim", "who": "nobody"}]"#).unwrap();
        let p = pool();
        let mut labels = Labels::default();
        assert!(run(&p, &steps, &mut labels, true).is_err());
    }

    #[test]
    fn labels_name_known_ids() {
        let mut labels = Labels::default();
        let id = labels.id("alice");
        assert_eq!(labels.name(&id), "alice");
        let other = ParticipantId::from_bytes([0; 32]);
        assert_eq!(labels.name(&other), "00".repeat(32));
    }
}
