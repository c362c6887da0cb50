//! Local optimistic edits
//!
//! Each command applies itself to the window state and returns the command
//! that undoes it. The engine applies, persists, and replays the inverse if
//! the save fails.

use tracing::debug;

use crate::model::{PlanKind, RowKey};
use crate::window::WindowState;

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Overwrite one half of a cell's plan. `planned` follows.
    SetPlan {
        key: RowKey,
        kind: PlanKind,
        value: f64,
    },
    /// Set the cached comment of a cell; `None` means the cell has none
    SetComment { key: RowKey, text: Option<String> },
    /// Drop a cached comment so the next read refetches it
    ForgetComment { key: RowKey },
    Batch(Vec<EditCommand>),
}

impl EditCommand {
    pub fn apply(&self, state: &mut WindowState) -> EditCommand {
        match self {
            EditCommand::SetPlan { key, kind, value } => {
                let row = state.rows.get_or_insert(key);
                let previous = match kind {
                    PlanKind::Base => std::mem::replace(&mut row.planned_base, *value),
                    PlanKind::Modifier => std::mem::replace(&mut row.planned_modifier, *value),
                };
                row.planned = row.planned_base + row.planned_modifier;
                debug!(%key, field = kind.field_name(), value, "plan edited");
                EditCommand::SetPlan {
                    key: key.clone(),
                    kind: *kind,
                    value: previous,
                }
            }
            EditCommand::SetComment { key, text } => {
                match state.comments.insert(key.clone(), text.clone()) {
                    Some(previous) => EditCommand::SetComment {
                        key: key.clone(),
                        text: previous,
                    },
                    None => EditCommand::ForgetComment { key: key.clone() },
                }
            }
            EditCommand::ForgetComment { key } => match state.comments.remove(key) {
                Some(previous) => EditCommand::SetComment {
                    key: key.clone(),
                    text: previous,
                },
                None => EditCommand::ForgetComment { key: key.clone() },
            },
            EditCommand::Batch(commands) => {
                let mut inverses: Vec<EditCommand> =
                    commands.iter().map(|c| c.apply(state)).collect();
                inverses.reverse();
                EditCommand::Batch(inverses)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetRow, Direction};
    use crate::month::Month;

    fn key(month: &str, category: &str) -> RowKey {
        RowKey::new(month.parse::<Month>().unwrap(), Direction::Spend, category)
    }

    fn state_with(row: BudgetRow) -> WindowState {
        let mut state = WindowState::default();
        state.rows.merge_back(vec![row]);
        state
    }

    #[test]
    fn test_set_plan_recomputes_planned_and_inverts() {
        let k = key("2026-03", "rent");
        let mut state = state_with(BudgetRow {
            planned_base: 1000.0,
            planned_modifier: 50.0,
            planned: 1050.0,
            ..BudgetRow::zero(&k)
        });

        let inverse = EditCommand::SetPlan {
            key: k.clone(),
            kind: PlanKind::Modifier,
            value: -25.0,
        }
        .apply(&mut state);
        let row = state.rows.get(&k).unwrap();
        assert_eq!(row.planned, 975.0);

        inverse.apply(&mut state);
        let row = state.rows.get(&k).unwrap();
        assert_eq!(row.planned_modifier, 50.0);
        assert_eq!(row.planned, 1050.0);
    }

    #[test]
    fn test_inverse_restores_only_edited_field() {
        let k = key("2026-03", "rent");
        let mut state = state_with(BudgetRow {
            planned_base: 1000.0,
            planned: 1000.0,
            ..BudgetRow::zero(&k)
        });

        let inverse = EditCommand::SetPlan {
            key: k.clone(),
            kind: PlanKind::Base,
            value: 1200.0,
        }
        .apply(&mut state);
        // Another edit to the other half lands before the rollback
        EditCommand::SetPlan {
            key: k.clone(),
            kind: PlanKind::Modifier,
            value: 30.0,
        }
        .apply(&mut state);
        inverse.apply(&mut state);

        let row = state.rows.get(&k).unwrap();
        assert_eq!(row.planned_base, 1000.0);
        assert_eq!(row.planned_modifier, 30.0);
        assert_eq!(row.planned, 1030.0);
    }

    #[test]
    fn test_set_plan_on_missing_row_creates_it() {
        let k = key("2026-05", "gym");
        let mut state = WindowState::default();
        EditCommand::SetPlan {
            key: k.clone(),
            kind: PlanKind::Base,
            value: 40.0,
        }
        .apply(&mut state);
        assert_eq!(state.rows.get(&k).unwrap().planned, 40.0);
    }

    #[test]
    fn test_batch_inverse_runs_in_reverse() {
        let k = key("2026-03", "rent");
        let mut state = WindowState::default();
        let batch = EditCommand::Batch(vec![
            EditCommand::SetPlan {
                key: k.clone(),
                kind: PlanKind::Base,
                value: 1.0,
            },
            EditCommand::SetPlan {
                key: k.clone(),
                kind: PlanKind::Base,
                value: 2.0,
            },
        ]);
        let inverse = batch.apply(&mut state);
        assert_eq!(state.rows.get(&k).unwrap().planned_base, 2.0);
        inverse.apply(&mut state);
        assert_eq!(state.rows.get(&k).unwrap().planned_base, 0.0);
    }

    #[test]
    fn test_comment_inverse() {
        let k = key("2026-03", "rent");
        let mut state = WindowState::default();

        let forget = EditCommand::SetComment {
            key: k.clone(),
            text: Some("deposit".to_string()),
        }
        .apply(&mut state);
        assert_eq!(forget, EditCommand::ForgetComment { key: k.clone() });
        assert_eq!(state.comments[&k].as_deref(), Some("deposit"));

        let restore = EditCommand::SetComment {
            key: k.clone(),
            text: None,
        }
        .apply(&mut state);
        restore.apply(&mut state);
        assert_eq!(state.comments[&k].as_deref(), Some("deposit"));

        forget.apply(&mut state);
        assert!(!state.comments.contains_key(&k));
    }
}
