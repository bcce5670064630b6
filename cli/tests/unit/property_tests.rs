//! Property-based tests for credential generation, quoting and plans.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use hardhost_cli::domain::credential::generate;
use hardhost_cli::domain::hardening::{HardeningPlan, HardeningStep};
use hardhost_cli::domain::remote::shell_quote;
use proptest::prelude::*;

fn any_step() -> impl Strategy<Value = HardeningStep> {
    prop::sample::select(HardeningStep::SEQUENCE.to_vec())
}

proptest! {
    /// Secrets have exactly the requested length and stay alphanumeric.
    #[test]
    fn prop_generated_secret_length_and_alphabet(len in 0usize..128) {
        let secret = generate(len);
        prop_assert_eq!(secret.chars().count(), len);
        prop_assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    /// Independent draws of a realistic length do not collide.
    #[test]
    fn prop_generated_secrets_are_independent(len in 8usize..64) {
        prop_assert_ne!(generate(len), generate(len));
    }

    /// Quoted values are either passed through bare or wrapped in single quotes.
    #[test]
    fn prop_shell_quote_never_leaves_metacharacters_bare(value in ".{0,40}") {
        let quoted = shell_quote(&value);
        if quoted == value {
            prop_assert!(!value.is_empty());
            prop_assert!(value.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c)));
        } else {
            prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''));
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace(r"'\''", "'"), value);
        }
    }

    /// Whatever gets skipped, the remaining steps keep canonical order.
    #[test]
    fn prop_plan_preserves_sequence_order(skip in prop::collection::vec(any_step(), 0..5)) {
        if let Ok(plan) = HardeningPlan::without(&skip) {
            let numbers: Vec<usize> = plan.steps().iter().map(|s| s.number()).collect();
            let mut sorted = numbers.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(numbers, sorted);
            prop_assert!(plan.steps().iter().all(|s| !skip.contains(s)));
        } else {
            prop_assert!(skip.contains(&HardeningStep::UserManagement));
            prop_assert!(!skip.contains(&HardeningStep::SshDaemon));
        }
    }
}
