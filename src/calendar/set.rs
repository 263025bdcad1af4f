use super::{Calendar, ProjectCalendar};
use crate::duration::TimeUnitDefaults;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

/// Handle to a calendar stored in a [`CalendarSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarId(usize);

impl CalendarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("unknown calendar handle {0}")]
    UnknownCalendar(usize),
    #[error("no calendar with unique id {0}")]
    UnknownUniqueId(i32),
    #[error("duplicate calendar unique id {0}")]
    DuplicateUniqueId(i32),
    #[error("calendar '{name}' is its own ancestor")]
    ParentCycle { name: String },
}

/// Collects calendars and links parents before the set becomes read-only.
#[derive(Debug, Default)]
pub struct CalendarSetBuilder {
    calendars: Vec<Calendar>,
    explicit_parents: Vec<(CalendarId, CalendarId)>,
    defaults: TimeUnitDefaults,
}

impl CalendarSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: TimeUnitDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn add(&mut self, calendar: Calendar) -> CalendarId {
        self.calendars.push(calendar);
        CalendarId(self.calendars.len() - 1)
    }

    /// Links `child` to `parent` directly, taking precedence over any
    /// parent unique id on the child.
    pub fn set_parent(&mut self, child: CalendarId, parent: CalendarId) {
        self.explicit_parents.push((child, parent));
    }

    /// Resolves parent references in one pass. Parent ids that match no
    /// calendar, or that point back at the calendar itself, leave the child
    /// without a parent.
    pub fn build(mut self) -> Result<CalendarSet, CalendarError> {
        let count = self.calendars.len();
        let mut by_unique_id: HashMap<i32, CalendarId> = HashMap::new();
        for (index, calendar) in self.calendars.iter().enumerate() {
            if let Some(unique_id) = calendar.unique_id {
                if by_unique_id.insert(unique_id, CalendarId(index)).is_some() {
                    return Err(CalendarError::DuplicateUniqueId(unique_id));
                }
            }
        }

        let mut parents: Vec<Option<CalendarId>> = self
            .calendars
            .iter()
            .map(|calendar| {
                let parent_id = calendar.parent_unique_id?;
                let parent = by_unique_id.get(&parent_id).copied();
                if parent.is_none() {
                    tracing::warn!(
                        calendar = %calendar.name,
                        parent_unique_id = parent_id,
                        "parent calendar not found, treating calendar as a base calendar"
                    );
                }
                parent
            })
            .collect();

        for (child, parent) in &self.explicit_parents {
            if child.0 >= count {
                return Err(CalendarError::UnknownCalendar(child.0));
            }
            if parent.0 >= count {
                return Err(CalendarError::UnknownCalendar(parent.0));
            }
            parents[child.0] = Some(*parent);
        }

        for (index, parent) in parents.iter_mut().enumerate() {
            if *parent == Some(CalendarId(index)) {
                tracing::warn!(
                    calendar = %self.calendars[index].name,
                    "calendar names itself as parent, treating it as a base calendar"
                );
                *parent = None;
            }
        }

        // Parent -> child edges; a cycle means a calendar inherits from itself.
        let mut graph: DiGraph<CalendarId, ()> = DiGraph::with_capacity(count, count);
        let nodes: Vec<NodeIndex> = (0..count).map(|index| graph.add_node(CalendarId(index))).collect();
        for (child, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                graph.add_edge(nodes[parent.0], nodes[child], ());
            }
        }
        toposort(&graph, None).map_err(|cycle| CalendarError::ParentCycle {
            name: self.calendars[graph[cycle.node_id()].0].name.clone(),
        })?;

        for (calendar, parent) in self.calendars.iter_mut().zip(parents) {
            calendar.set_parent(parent);
        }

        tracing::debug!(calendars = count, "calendar set resolved");
        Ok(CalendarSet {
            calendars: self.calendars,
            by_unique_id,
            defaults: self.defaults,
        })
    }
}

/// Read-only arena of calendars with resolved parent links.
#[derive(Debug, Clone, Default)]
pub struct CalendarSet {
    calendars: Vec<Calendar>,
    by_unique_id: HashMap<i32, CalendarId>,
    defaults: TimeUnitDefaults,
}

impl CalendarSet {
    pub fn builder() -> CalendarSetBuilder {
        CalendarSetBuilder::new()
    }

    /// A set holding one calendar with no parent.
    pub fn single(calendar: Calendar) -> Result<(CalendarSet, CalendarId), CalendarError> {
        let mut builder = CalendarSetBuilder::new();
        let id = builder.add(calendar);
        Ok((builder.build()?, id))
    }

    pub fn get(&self, id: CalendarId) -> Result<ProjectCalendar<'_>, CalendarError> {
        if id.0 < self.calendars.len() {
            Ok(ProjectCalendar::new(self, id))
        } else {
            Err(CalendarError::UnknownCalendar(id.0))
        }
    }

    pub fn by_unique_id(&self, unique_id: i32) -> Result<ProjectCalendar<'_>, CalendarError> {
        self.by_unique_id
            .get(&unique_id)
            .map(|id| ProjectCalendar::new(self, *id))
            .ok_or(CalendarError::UnknownUniqueId(unique_id))
    }

    pub fn by_name(&self, name: &str) -> Option<ProjectCalendar<'_>> {
        self.calendars
            .iter()
            .position(|calendar| calendar.name == name)
            .map(|index| ProjectCalendar::new(self, CalendarId(index)))
    }

    pub fn calendar(&self, id: CalendarId) -> Option<&Calendar> {
        self.calendars.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = ProjectCalendar<'_>> {
        (0..self.calendars.len()).map(|index| ProjectCalendar::new(self, CalendarId(index)))
    }

    /// Calendars whose parent is `id`.
    pub fn derived_calendars(&self, id: CalendarId) -> Vec<CalendarId> {
        self.calendars
            .iter()
            .enumerate()
            .filter(|(_, calendar)| calendar.parent() == Some(id))
            .map(|(index, _)| CalendarId(index))
            .collect()
    }

    pub fn defaults(&self) -> &TimeUnitDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    pub(crate) fn entry(&self, id: CalendarId) -> &Calendar {
        &self.calendars[id.0]
    }
}
