//! Objectives - goals the player is working toward.
//!
//! An objective has a name, a completion condition, an optional visibility
//! condition and an optional effect that runs when it becomes complete.
//! Objectives are owned by an [`ObjectiveList`], which re-checks them on
//! every state change.

mod list;

pub use list::*;

use site_state::StateLookup;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ConditionError, ObjectiveError};

static OBJECTIVE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Process-unique, sequential objective id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectiveId(pub u64);

impl std::fmt::Display for ObjectiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Predicate = Rc<dyn Fn(&dyn StateLookup) -> Result<bool, ConditionError>>;
type ProgressFn = Rc<dyn Fn(&dyn StateLookup) -> String>;
pub(crate) type Effect = Box<dyn FnMut()>;

/// A literal completion token or a caller-supplied predicate.
#[derive(Clone)]
pub enum Condition {
    /// Satisfied while the page flag of that name is truthy.
    Token(String),
    Predicate(Predicate),
}

impl Condition {
    pub fn token(token: impl Into<String>) -> Self {
        Condition::Token(token.into())
    }

    pub fn predicate(
        predicate: impl Fn(&dyn StateLookup) -> Result<bool, ConditionError> + 'static,
    ) -> Self {
        Condition::Predicate(Rc::new(predicate))
    }

    /// Predicate that cannot fail.
    pub fn when(predicate: impl Fn(&dyn StateLookup) -> bool + 'static) -> Self {
        Condition::Predicate(Rc::new(move |state| Ok(predicate(state))))
    }

    pub fn evaluate(&self, state: &dyn StateLookup) -> Result<bool, ConditionError> {
        match self {
            Condition::Token(token) => Ok(state.check(token)),
            Condition::Predicate(predicate) => predicate(state),
        }
    }
}

impl From<&str> for Condition {
    fn from(token: &str) -> Self {
        Condition::token(token)
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Token(token) => f.debug_tuple("Token").field(token).finish(),
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A single trackable goal.
pub struct Objective {
    id: ObjectiveId,
    pub name: String,
    pub completion: Condition,
    pub progress: Option<ProgressFn>,
    pub show_if: Option<Condition>,
    pub hide_on_completion: bool,
    pub definition: Option<String>,
    exec: Option<Effect>,
    pub priority: i32,
    completed: bool,
}

impl Objective {
    pub fn new(name: impl Into<String>, completion: impl Into<Condition>) -> Self {
        let id = OBJECTIVE_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        Self {
            id: ObjectiveId(id),
            name: name.into(),
            completion: completion.into(),
            progress: None,
            show_if: None,
            hide_on_completion: false,
            definition: None,
            exec: None,
            priority: 0,
            completed: false,
        }
    }

    /// Number of objectives created so far in this process.
    pub fn count() -> u64 {
        OBJECTIVE_COUNT.load(Ordering::Relaxed)
    }

    pub fn with_progress(mut self, progress: impl Fn(&dyn StateLookup) -> String + 'static) -> Self {
        self.progress = Some(Rc::new(progress));
        self
    }

    pub fn with_show_if(mut self, show_if: impl Into<Condition>) -> Self {
        self.show_if = Some(show_if.into());
        self
    }

    pub fn hide_on_completion(mut self) -> Self {
        self.hide_on_completion = true;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Effect run each time the objective goes from incomplete to complete.
    pub fn with_exec(mut self, exec: impl FnMut() + 'static) -> Self {
        self.exec = Some(Box::new(exec));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> ObjectiveId {
        self.id
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn failed(&self, source: ConditionError) -> ObjectiveError {
        ObjectiveError::Condition {
            objective: self.name.clone(),
            source,
        }
    }

    /// Re-evaluate completion, running `exec` if the objective just became
    /// complete. An objective that falls back to incomplete can complete,
    /// and run `exec`, again later.
    pub fn check_completion(&mut self, state: &dyn StateLookup) -> Result<bool, ObjectiveError> {
        if self.update_completed(state)? {
            if let Some(exec) = self.exec.as_mut() {
                exec();
            }
        }
        Ok(self.completed)
    }

    /// Re-evaluate completion without running `exec`. True if the
    /// objective went from incomplete to complete.
    pub(crate) fn update_completed(
        &mut self,
        state: &dyn StateLookup,
    ) -> Result<bool, ObjectiveError> {
        let done = self
            .completion
            .evaluate(state)
            .map_err(|source| self.failed(source))?;
        let newly_completed = done && !self.completed;
        self.completed = done;
        Ok(newly_completed)
    }

    pub(crate) fn take_exec(&mut self) -> Option<Effect> {
        self.exec.take()
    }

    pub(crate) fn restore_exec(&mut self, exec: Effect) {
        self.exec.get_or_insert(exec);
    }

    /// Whether the objective should be listed.
    pub fn should_show(&self, state: &dyn StateLookup) -> Result<bool, ObjectiveError> {
        if self.hide_on_completion && self.completed {
            return Ok(false);
        }
        match &self.show_if {
            Some(condition) => condition.evaluate(state).map_err(|source| self.failed(source)),
            None => Ok(true),
        }
    }

    /// Progress text, if the objective reports any.
    pub fn progress_text(&self, state: &dyn StateLookup) -> Option<String> {
        self.progress.as_ref().map(|progress| progress(state))
    }
}

impl std::fmt::Debug for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Objective")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("completion", &self.completion)
            .field("show_if", &self.show_if)
            .field("hide_on_completion", &self.hide_on_completion)
            .field("priority", &self.priority)
            .field("completed", &self.completed)
            .finish()
    }
}
