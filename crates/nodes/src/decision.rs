//! `DecisionNode` — the decision-gateway node behavior (§4.4).
//!
//! Execution itself is a synchronous pass-through identical to `BaseNode`;
//! the behavior that actually makes this a decision gateway is
//! `can_follow_outgoing_flow`, which evaluates each flow's guard expression
//! against the instance's variables and only lets matching flows through.
//! Multiple matches are permitted (inclusive-gateway semantics); zero
//! matches simply halts that branch (§4.4, §9).

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::warn;

use crate::traits::{ExecutionContext, ExecutionOutcome, FlowGuard, NodeBehavior, Variables};

pub struct DecisionNode;

#[async_trait]
impl NodeBehavior for DecisionNode {
    async fn execute_internal(&mut self, _ctx: &ExecutionContext) -> ExecutionOutcome {
        ExecutionOutcome::Completed(Ok(None))
    }

    fn can_follow_outgoing_flow(&self, guard: FlowGuard<'_>, variables: &Variables) -> bool {
        match guard.guard {
            None => true,
            Some(expr) => evaluate_guard(expr, variables).unwrap_or_else(|err| {
                warn!(guard = expr, error = %err, "decision guard failed to evaluate, treating as false");
                false
            }),
        }
    }
}

/// Evaluate a `fasteval` arithmetic/comparison expression against the
/// instance's variables. Non-numeric, non-boolean variables are simply
/// absent from the namespace the guard sees — the guard dialect is
/// deliberately opaque and numeric-only (§4.4's "evaluator's dialect is
/// external"); this is one concrete choice of that dialect.
fn evaluate_guard(expr: &str, variables: &Variables) -> Result<bool, fasteval::Error> {
    let mut namespace: BTreeMap<String, f64> = BTreeMap::new();
    for (key, value) in variables {
        if let Some(n) = value.as_f64() {
            namespace.insert(key.clone(), n);
        } else if let Some(b) = value.as_bool() {
            namespace.insert(key.clone(), if b { 1.0 } else { 0.0 });
        }
    }
    let result = fasteval::ez_eval(expr, &mut namespace)?;
    Ok(result != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, serde_json::Value)]) -> Variables {
        let mut map = Variables::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), v.clone());
        }
        map
    }

    #[test]
    fn unconditional_guard_always_matches() {
        let node = DecisionNode;
        let v = vars(&[]);
        assert!(node.can_follow_outgoing_flow(FlowGuard { guard: None }, &v));
    }

    #[test]
    fn numeric_comparison_guard() {
        let node = DecisionNode;
        let v = vars(&[("x", json!(5))]);
        assert!(node.can_follow_outgoing_flow(FlowGuard { guard: Some("x>0") }, &v));
        assert!(!node.can_follow_outgoing_flow(FlowGuard { guard: Some("x<=0") }, &v));
    }

    #[test]
    fn malformed_guard_treated_as_false() {
        let node = DecisionNode;
        let v = vars(&[]);
        assert!(!node.can_follow_outgoing_flow(FlowGuard { guard: Some("not(a valid expr") }, &v));
    }
}
