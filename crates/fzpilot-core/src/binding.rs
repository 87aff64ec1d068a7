//! Action groups and the binding algebra
//!
//! A [`Binding`] is what gets attached to a trigger: either one named
//! [`ActionGroup`], or a cycle of several groups for triggers that should do
//! something different each time they fire. Bindings combine with
//! [`Binding::then`] (sequencing, `+`) and [`Binding::cycle_with`] (cycling,
//! `|`); both are pure and return new bindings, so a library of reusable named
//! bindings can be recombined freely.
//!
//! Laws upheld here (and pinned by the tests below):
//! - `then` is associative, `cycle_with` is associative and flattens;
//! - `then` distributes over `cycle_with` from both sides;
//! - sequencing two cycles is an error;
//! - a cycle can never carry a finishing action.

use crate::action::{Action, EndStatus};
use crate::error::{Error, Result};

/// A named, ordered list of actions with at most one trailing finishing action.
#[derive(Debug, Clone)]
pub struct ActionGroup {
    name: String,
    actions: Vec<Action>,
    final_action: Option<EndStatus>,
}

impl ActionGroup {
    /// Build a group, deriving its name from the actions.
    ///
    /// Walks the action list once; any action placed after a finishing action
    /// is rejected.
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        Self::build(None, actions.into_iter().collect())
    }

    /// Build a group with an explicit human name.
    pub fn named(name: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        Self::build(Some(name.into()), actions.into_iter().collect())
    }

    fn build(name: Option<String>, actions: Vec<Action>) -> Result<Self> {
        let derived = name.unwrap_or_else(|| {
            if actions.is_empty() {
                "empty".to_string()
            } else {
                actions
                    .iter()
                    .map(Action::summary)
                    .collect::<Vec<_>>()
                    .join("+")
            }
        });

        let mut kept = Vec::with_capacity(actions.len());
        let mut final_action = None;
        for action in actions {
            if final_action.is_some() {
                return Err(Error::final_action_not_last(derived));
            }
            match action {
                Action::End(status) => final_action = Some(status),
                other => kept.push(other),
            }
        }

        Ok(Self {
            name: derived,
            actions: kept,
            final_action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn final_action(&self) -> Option<EndStatus> {
        self.final_action
    }

    /// Sequence two groups. The left group must not already finish the
    /// session — nothing may run after a finishing action.
    pub fn concat(left: &ActionGroup, right: &ActionGroup) -> Result<ActionGroup> {
        let name = format!("{}+{}", left.name, right.name);
        if left.final_action.is_some() {
            return Err(Error::final_action_not_last(name));
        }
        let mut actions = left.actions.clone();
        actions.extend(right.actions.iter().cloned());
        Ok(ActionGroup {
            name,
            actions,
            final_action: right.final_action,
        })
    }

    /// Render this group's action expression, finishing action last.
    pub fn rendered(&self) -> String {
        let mut parts: Vec<String> = self.actions.iter().map(Action::action_string).collect();
        if let Some(status) = self.final_action {
            parts.push(status.native_action().to_string());
        }
        parts.join("+")
    }
}

/// A triggerable sequence (one group) or cycle (two or more) of action groups.
#[derive(Debug, Clone)]
pub struct Binding {
    groups: Vec<ActionGroup>,
}

impl Binding {
    pub fn from_group(group: ActionGroup) -> Self {
        Self {
            groups: vec![group],
        }
    }

    /// Convenience: a single-group binding from a list of actions.
    pub fn of(actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        Ok(Self::from_group(ActionGroup::new(actions)?))
    }

    /// Convenience: a named single-group binding.
    pub fn named(name: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        Ok(Self::from_group(ActionGroup::named(name, actions)?))
    }

    pub fn groups(&self) -> &[ActionGroup] {
        &self.groups
    }

    pub fn is_cycle(&self) -> bool {
        self.groups.len() > 1
    }

    /// The actions of a plain binding; `None` for a cycle.
    pub fn actions(&self) -> Option<&[Action]> {
        match self.groups.as_slice() {
            [group] => Some(group.actions()),
            _ => None,
        }
    }

    /// The finishing action of a plain binding; a cycle never has one.
    pub fn final_action(&self) -> Option<EndStatus> {
        match self.groups.as_slice() {
            [group] => group.final_action(),
            _ => None,
        }
    }

    pub fn ends_session(&self) -> bool {
        self.final_action().is_some()
    }

    pub fn name(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.name().to_string())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Sequence: fire `self`'s actions, then `other`'s.
    ///
    /// Distributes over cycles from either side; sequencing two cycles is
    /// undefined and rejected.
    pub fn then(&self, other: &Binding) -> Result<Binding> {
        match (self.is_cycle(), other.is_cycle()) {
            (true, true) => Err(Error::cycle_sequence(self.name(), other.name())),
            (false, false) => Ok(Binding::from_group(ActionGroup::concat(
                &self.groups[0],
                &other.groups[0],
            )?)),
            (false, true) => {
                let groups = other
                    .groups
                    .iter()
                    .map(|g| ActionGroup::concat(&self.groups[0], g))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Binding { groups })
            }
            (true, false) => {
                let groups = self
                    .groups
                    .iter()
                    .map(|g| ActionGroup::concat(g, &other.groups[0]))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Binding { groups })
            }
        }
    }

    /// Cycle: alternate between `self`'s groups and `other`'s on successive
    /// firings. Nested cycles flatten into one cycle list.
    ///
    /// A cycle cannot carry a finishing action — which firing would end the
    /// session is ambiguous.
    pub fn cycle_with(&self, other: &Binding) -> Result<Binding> {
        let mut groups = self.groups.clone();
        groups.extend(other.groups.iter().cloned());
        if groups.len() > 1 && groups.iter().any(|g| g.final_action().is_some()) {
            let name = groups
                .iter()
                .map(|g| g.name().to_string())
                .collect::<Vec<_>>()
                .join("|");
            return Err(Error::cycle_with_final_action(name));
        }
        Ok(Binding { groups })
    }

    /// Rendered action expression of every group, in cycle order.
    pub fn rendered_groups(&self) -> Vec<String> {
        self.groups.iter().map(ActionGroup::rendered).collect()
    }
}

impl From<ActionGroup> for Binding {
    fn from(group: ActionGroup) -> Self {
        Self::from_group(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str, action: &str) -> Binding {
        Binding::named(name, [Action::base(action)]).unwrap()
    }

    #[test]
    fn test_final_action_must_be_last() {
        let err = ActionGroup::new([
            Action::base("select-all"),
            Action::accept(),
            Action::base("up"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::FinalActionNotLast { .. }));

        let ok = ActionGroup::new([Action::base("select-all"), Action::accept()]).unwrap();
        assert_eq!(ok.final_action(), Some(EndStatus::Accept));
        assert_eq!(ok.rendered(), "select-all+accept");
    }

    #[test]
    fn test_two_final_actions_rejected() {
        let err = ActionGroup::new([Action::accept(), Action::abort()]).unwrap_err();
        assert!(matches!(err, Error::FinalActionNotLast { .. }));
    }

    #[test]
    fn test_then_is_associative() {
        let a = plain("a", "up");
        let b = plain("b", "down");
        let c = plain("c", "toggle");

        let left = a.then(&b).unwrap().then(&c).unwrap();
        let right = a.then(&b.then(&c).unwrap()).unwrap();
        assert_eq!(left.rendered_groups(), right.rendered_groups());
        assert_eq!(left.rendered_groups(), vec!["up+down+toggle".to_string()]);
    }

    #[test]
    fn test_then_rejects_actions_after_final() {
        let ending = Binding::of([Action::accept()]).unwrap();
        let follow = plain("f", "up");
        assert!(matches!(
            ending.then(&follow),
            Err(Error::FinalActionNotLast { .. })
        ));
    }

    #[test]
    fn test_cycle_is_associative_and_flattens() {
        let a = plain("a", "up");
        let b = plain("b", "down");
        let c = plain("c", "toggle");

        let left = a.cycle_with(&b).unwrap().cycle_with(&c).unwrap();
        let right = a.cycle_with(&b.cycle_with(&c).unwrap()).unwrap();
        assert_eq!(left.rendered_groups(), right.rendered_groups());
        assert_eq!(left.groups().len(), 3);
    }

    #[test]
    fn test_cycling_two_cycles_is_legal() {
        let ab = plain("a", "up").cycle_with(&plain("b", "down")).unwrap();
        let cd = plain("c", "left").cycle_with(&plain("d", "right")).unwrap();
        let all = ab.cycle_with(&cd).unwrap();
        assert_eq!(all.groups().len(), 4);
        assert_eq!(
            all.rendered_groups(),
            vec!["up", "down", "left", "right"]
        );
    }

    #[test]
    fn test_then_distributes_over_cycle_from_the_left() {
        let a = plain("a", "up");
        let bc = plain("b", "down").cycle_with(&plain("c", "toggle")).unwrap();

        let sequenced = a.then(&bc).unwrap();
        let distributed = a
            .then(&plain("b", "down"))
            .unwrap()
            .cycle_with(&a.then(&plain("c", "toggle")).unwrap())
            .unwrap();
        assert_eq!(sequenced.rendered_groups(), distributed.rendered_groups());
        assert_eq!(sequenced.rendered_groups(), vec!["up+down", "up+toggle"]);
    }

    #[test]
    fn test_then_distributes_over_cycle_from_the_right() {
        let ab = plain("a", "up").cycle_with(&plain("b", "down")).unwrap();
        let c = plain("c", "toggle");

        let sequenced = ab.then(&c).unwrap();
        assert_eq!(sequenced.rendered_groups(), vec!["up+toggle", "down+toggle"]);
    }

    #[test]
    fn test_sequencing_two_cycles_is_rejected() {
        let ab = plain("a", "up").cycle_with(&plain("b", "down")).unwrap();
        let cd = plain("c", "left").cycle_with(&plain("d", "right")).unwrap();
        assert!(matches!(ab.then(&cd), Err(Error::CycleSequence { .. })));
    }

    #[test]
    fn test_cycle_cannot_carry_final_action() {
        let ending = Binding::of([Action::base("select-all"), Action::accept()]).unwrap();
        let other = plain("o", "up");
        assert!(matches!(
            ending.cycle_with(&other),
            Err(Error::CycleWithFinalAction { .. })
        ));
        assert!(matches!(
            other.cycle_with(&ending),
            Err(Error::CycleWithFinalAction { .. })
        ));
    }

    #[test]
    fn test_combinators_do_not_mutate_operands() {
        let a = plain("a", "up");
        let b = plain("b", "down");
        let _ = a.then(&b).unwrap();
        let _ = a.cycle_with(&b).unwrap();
        assert_eq!(a.rendered_groups(), vec!["up"]);
        assert_eq!(b.rendered_groups(), vec!["down"]);
    }

    #[test]
    fn test_auto_derived_names() {
        let group = ActionGroup::new([Action::base("select-all"), Action::accept()]).unwrap();
        assert_eq!(group.name(), "select-all+accept");
    }
}
