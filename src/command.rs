//! Commands and the command log.
//!
//! A [`Command`] is a side effect the workflow decided on during a pass. It starts
//! out [`CommandState::New`] and becomes [`CommandState::Committed`] once replay
//! observes the scheduling event that records it. The [`CommandLog`] keeps them in
//! the order they were produced, which is also ascending id order.

use serde::{Deserialize, Serialize};

use crate::error::CommandLogError;
use crate::payload::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandState {
    New,
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attributes")]
pub enum CommandKind {
    ScheduleActivityTask {
        name: String,
        version: String,
        inputs: Vec<Payload>,
    },
    ScheduleTimer {
        delay_ms: u64,
    },
}

impl CommandKind {
    fn describe(&self) -> String {
        match self {
            CommandKind::ScheduleActivityTask { name, inputs, .. } => {
                format!("ScheduleActivityTask('{name}', {} inputs)", inputs.len())
            }
            CommandKind::ScheduleTimer { delay_ms } => format!("ScheduleTimer({delay_ms}ms)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: i64,
    #[serde(flatten)]
    pub kind: CommandKind,
    pub state: CommandState,
}

impl Command {
    pub fn new(id: i64, kind: CommandKind) -> Self {
        Self {
            id,
            kind,
            state: CommandState::New,
        }
    }

    pub fn schedule_activity(id: i64, name: impl Into<String>, inputs: Vec<Payload>) -> Self {
        Self::new(
            id,
            CommandKind::ScheduleActivityTask {
                name: name.into(),
                version: String::new(),
                inputs,
            },
        )
    }

    pub fn schedule_timer(id: i64, delay_ms: u64) -> Self {
        Self::new(id, CommandKind::ScheduleTimer { delay_ms })
    }

    pub fn is_new(&self) -> bool {
        self.state == CommandState::New
    }
}

/// Ordered, mutable list of the commands produced by the workflow.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Vec<Command>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command in state New. Ids come from a single increasing counter, so
    /// appending keeps the log sorted.
    pub fn append(&mut self, mut command: Command) {
        debug_assert!(
            self.commands.last().is_none_or(|last| last.id < command.id),
            "command ids must increase"
        );
        command.state = CommandState::New;
        self.commands.push(command);
    }

    /// Mark the command with `id` committed, checking it against what history recorded.
    pub fn commit(&mut self, id: i64, recorded: &CommandKind) -> Result<(), CommandLogError> {
        let idx = self
            .commands
            .iter()
            .position(|c| c.id == id)
            .ok_or(CommandLogError::NotFound { id })?;
        if self.commands[idx].state == CommandState::Committed {
            return Err(CommandLogError::AlreadyCommitted { id });
        }
        // Sorted by id, so anything older sits before `idx`.
        if let Some(pending) = self.commands[..idx].iter().find(|c| c.is_new()) {
            return Err(CommandLogError::OutOfOrder { id, pending: pending.id });
        }
        let command = &mut self.commands[idx];
        if &command.kind != recorded {
            return Err(CommandLogError::Mismatch {
                id,
                produced: command.kind.describe(),
                recorded: recorded.describe(),
            });
        }
        command.state = CommandState::Committed;
        Ok(())
    }

    /// Withdraw a command that has not been committed yet.
    pub fn remove(&mut self, id: i64) -> Result<Command, CommandLogError> {
        let idx = self
            .commands
            .iter()
            .position(|c| c.id == id)
            .ok_or(CommandLogError::NotFound { id })?;
        if self.commands[idx].state == CommandState::Committed {
            return Err(CommandLogError::AlreadyCommitted { id });
        }
        Ok(self.commands.remove(idx))
    }

    pub fn state_of(&self, id: i64) -> Option<CommandState> {
        self.commands.iter().find(|c| c.id == id).map(|c| c.state)
    }

    pub fn get(&self, id: i64) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Decisions still waiting to be durably recorded.
    pub fn new_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| c.is_new())
    }

    /// Drop commands whose scheduling has already been recorded.
    pub fn prune_committed(&mut self) -> usize {
        let before = self.commands.len();
        self.commands.retain(Command::is_new);
        before - self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Command> {
        self.commands.clone()
    }
}
