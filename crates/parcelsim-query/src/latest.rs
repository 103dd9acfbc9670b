//! Latest-state reduction strategies
//!
//! Both strategies reduce an event stream to the most recent event per
//! entity and must produce the same count. Ties on the latest timestamp go to
//! the most recently stored event in both.

use crate::error::QueryError;
use parcelsim_core::{Field, MatchSpec, SortKey, Stage, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatestStrategy {
    /// Sort by (entity asc, time desc), keep the first row per entity
    SortGroup,
    /// Rank rows per entity by time desc and keep rank one
    #[default]
    Window,
}

impl LatestStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatestStrategy::SortGroup => "sort-group",
            LatestStrategy::Window => "window",
        }
    }

    /// Stages that reduce the stream to latest events and then keep those
    /// whose status is in `statuses`. With no statuses every latest event is
    /// kept, one per entity.
    pub fn stages(&self, statuses: Option<&BTreeSet<Status>>) -> Vec<Stage> {
        match self {
            LatestStrategy::SortGroup => {
                let mut stages = vec![
                    Stage::Sort(vec![SortKey::asc(Field::EntityId), SortKey::desc(Field::Time)]),
                    Stage::GroupFirst {
                        key: Field::EntityId,
                    },
                ];
                if let Some(statuses) = statuses {
                    stages.push(Stage::Match(MatchSpec::new().with_statuses(statuses.clone())));
                }
                stages
            }
            LatestStrategy::Window => {
                let mut latest = MatchSpec::new().latest_only();
                if let Some(statuses) = statuses {
                    latest = latest.with_statuses(statuses.clone());
                }
                vec![
                    Stage::SetWindowFields {
                        partition_by: Field::EntityId,
                        sort_by: vec![SortKey::desc(Field::Time)],
                    },
                    Stage::Match(latest),
                ]
            }
        }
    }
}

impl fmt::Display for LatestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LatestStrategy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "sort-group" | "sort" | "group" => Ok(LatestStrategy::SortGroup),
            "window" | "set-window-fields" => Ok(LatestStrategy::Window),
            other => Err(QueryError::InvalidQuery(format!(
                "unknown latest-state strategy: {}",
                other
            ))),
        }
    }
}
