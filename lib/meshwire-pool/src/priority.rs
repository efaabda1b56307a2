//! Closed set of priority classes (spec.md §3.4). Ordering between classes
//! is semantic, never numeric — callers declare a primary priority plus an
//! ordered fallback list rather than relying on `Priority`'s declaration
//! order to mean anything.

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];
}
