//! Interactive confirmation seam.
//!
//! The engine never reads the terminal itself. It asks a [`Prompter`] and
//! threads a [`ConfirmationPolicy`] value through the run; choices like
//! "yes to all" produce a new policy instead of mutating shared state.

use serde_json::Value;

use super::hooks::{HooksAnalysis, HooksStrategy};

/// Answer to "apply this incoming content?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Yes,
    No,
    YesToAll,
    Quit,
    Preview,
}

/// Answer to "which value wins for this registry key?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChoice {
    TakeRemote,
    TakeLocal,
    TakeRemoteForAll,
    TakeLocalForAll,
}

/// Side that wins a bulk key decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// Run-scoped confirmation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    auto_confirm: bool,
    bulk_side: Option<Side>,
}

impl ConfirmationPolicy {
    /// Ask before every overwrite.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            auto_confirm: false,
            bulk_side: None,
        }
    }

    /// Never ask. Registry conflicts keep the local value.
    #[must_use]
    pub const fn auto() -> Self {
        Self {
            auto_confirm: true,
            bulk_side: None,
        }
    }

    #[must_use]
    pub const fn is_auto(self) -> bool {
        self.auto_confirm
    }

    /// Side chosen for all remaining registry conflicts, if any.
    #[must_use]
    pub const fn bulk_side(self) -> Option<Side> {
        self.bulk_side
    }

    /// Policy after the operator answered "yes to all".
    #[must_use]
    pub const fn escalated(self) -> Self {
        Self {
            auto_confirm: true,
            ..self
        }
    }

    /// Policy after the operator picked a side for all remaining conflicts.
    #[must_use]
    pub const fn with_bulk_side(self, side: Side) -> Self {
        Self {
            bulk_side: Some(side),
            ..self
        }
    }
}

/// Source of interactive decisions.
pub trait Prompter {
    /// Ask whether `incoming` should replace `current` for an item.
    fn confirm(&mut self, item: &str, current: &str, incoming: &str) -> ConfirmChoice;

    /// Show the full incoming content before asking again.
    fn preview(&mut self, item: &str, incoming: &str);

    /// Ask which value wins for a registry key present on both sides.
    fn resolve_key(&mut self, context: &str, key: &str, local: &Value, remote: &Value)
    -> KeyChoice;

    /// Ask how to treat incoming hooks that carry device-specific content.
    ///
    /// `None` cancels the pull.
    fn choose_hooks(&mut self, item: &str, analysis: &HooksAnalysis) -> Option<HooksStrategy>;
}

/// Prompter for non-interactive runs: applies everything, keeps local
/// values on registry conflicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn confirm(&mut self, _item: &str, _current: &str, _incoming: &str) -> ConfirmChoice {
        ConfirmChoice::Yes
    }

    fn preview(&mut self, _item: &str, _incoming: &str) {}

    fn resolve_key(
        &mut self,
        _context: &str,
        _key: &str,
        _local: &Value,
        _remote: &Value,
    ) -> KeyChoice {
        KeyChoice::TakeLocal
    }

    fn choose_hooks(&mut self, _item: &str, _analysis: &HooksAnalysis) -> Option<HooksStrategy> {
        Some(HooksStrategy::Overwrite)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Prompter that replays scripted answers and records what was asked.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        pub confirms: VecDeque<ConfirmChoice>,
        pub keys: VecDeque<KeyChoice>,
        pub asked_items: Vec<String>,
        pub asked_keys: Vec<String>,
        pub previews: usize,
        pub hooks: Option<HooksStrategy>,
        pub cancel_hooks: bool,
        pub hooks_asked: usize,
    }

    impl ScriptedPrompter {
        pub fn with_confirms(choices: &[ConfirmChoice]) -> Self {
            Self {
                confirms: choices.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub fn with_keys(choices: &[KeyChoice]) -> Self {
            Self {
                keys: choices.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&mut self, item: &str, _current: &str, _incoming: &str) -> ConfirmChoice {
            self.asked_items.push(item.to_string());
            self.confirms.pop_front().unwrap_or(ConfirmChoice::No)
        }

        fn preview(&mut self, _item: &str, _incoming: &str) {
            self.previews += 1;
        }

        fn resolve_key(
            &mut self,
            context: &str,
            key: &str,
            _local: &Value,
            _remote: &Value,
        ) -> KeyChoice {
            self.asked_keys.push(format!("{context}.{key}"));
            self.keys.pop_front().unwrap_or(KeyChoice::TakeLocal)
        }

        fn choose_hooks(&mut self, _item: &str, _analysis: &HooksAnalysis) -> Option<HooksStrategy> {
            self.hooks_asked += 1;
            if self.cancel_hooks {
                None
            } else {
                Some(self.hooks.unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_is_functional() {
        let policy = ConfirmationPolicy::interactive();
        let escalated = policy.escalated();
        assert!(!policy.is_auto());
        assert!(escalated.is_auto());
    }

    #[test]
    fn test_bulk_side_survives_escalation() {
        let policy = ConfirmationPolicy::interactive()
            .with_bulk_side(Side::Remote)
            .escalated();
        assert_eq!(policy.bulk_side(), Some(Side::Remote));
    }
}
