// src/exec/prompt.rs

//! Typed prompt construction for worker invocations.

use std::fmt::Write as _;

use crate::source::Task;

/// Builds the prompt text handed to a worker.
///
/// Every piece is a separate field; nothing is spliced into a template, so
/// task text can contain any characters.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    instructions: Vec<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(id: &'a str, title: &'a str) -> Self {
        Self {
            id,
            title,
            ..Self::default()
        }
    }

    pub fn for_task(task: &'a Task) -> Self {
        Self::new(&task.id, &task.title).description(&task.description)
    }

    pub fn description(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }

    /// Append one block of extra instructions. Blank input is ignored.
    pub fn instruction(mut self, text: &'a str) -> Self {
        if !text.trim().is_empty() {
            self.instructions.push(text);
        }
        self
    }

    pub fn instructions(self, text: Option<&'a str>) -> Self {
        match text {
            Some(t) => self.instruction(t),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# Task {}: {}", self.id, self.title.trim());
        out.push('\n');

        let description = self.description.trim();
        if description.is_empty() {
            out.push_str("(no description provided)\n");
        } else {
            out.push_str(description);
            out.push('\n');
        }

        if !self.instructions.is_empty() {
            out.push_str("\n## Instructions\n\n");
            for block in &self.instructions {
                out.push_str(block.trim());
                out.push('\n');
            }
        }

        out
    }
}
