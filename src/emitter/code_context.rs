use std::collections::HashSet;

use log::warn;

use super::mnemonics::Instruction;

/// Instruction buffer of one generation run. Owns the label counter so
/// numbering starts over with every compiled program.
#[derive(Debug, Clone, Default)]
pub struct CodeContext {
    instructions: Vec<Instruction>,
    label_counter: usize,
    labels: HashSet<String>,
    emit_comments: bool,
    errors: Vec<String>,
}

impl CodeContext {
    pub fn new(emit_comments: bool) -> Self {
        Self {
            emit_comments,
            ..Default::default()
        }
    }

    pub fn add(&mut self, instruction: impl Into<Instruction>) -> &mut Self {
        self.instructions.push(instruction.into());
        self
    }

    pub fn add_slice(&mut self, instructions: &[Instruction]) {
        self.instructions.extend_from_slice(instructions);
    }

    /// Explanatory comment, dropped when comments are disabled.
    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        if self.emit_comments {
            self.instructions.push(Instruction::Comment(text.into()));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        if self.emit_comments {
            self.instructions.push(Instruction::Blank);
        }
        self
    }

    /// Marks a construct that could not be translated. The marker is always
    /// emitted and the message is kept for the caller.
    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        let message = message.into();
        warn!("code generation: {message}");
        self.instructions
            .push(Instruction::Comment(format!("ERROR: {message}")));
        self.errors.push(message);
        self
    }

    /// Fresh label name, unique within this context. Counter values whose
    /// name is already taken are skipped.
    pub fn new_label(&mut self, prefix: &str) -> String {
        loop {
            self.label_counter += 1;
            let label = format!("{prefix}{}", self.label_counter);
            if self.labels.insert(label.clone()) {
                return label;
            }
        }
    }

    /// Claims `name` as a label, or `name_2`, `name_3`... when it is taken.
    pub fn reserve_label(&mut self, name: &str) -> String {
        let mut label = name.to_string();
        let mut n = 1;
        while !self.labels.insert(label.clone()) {
            n += 1;
            label = format!("{name}_{n}");
        }
        label
    }

    pub fn label(&mut self, label: &str) -> &mut Self {
        self.instructions.push(Instruction::Label(label.to_string()));
        self
    }

    pub fn get_instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get_errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_parts(self) -> (Vec<Instruction>, Vec<String>) {
        (self.instructions, self.errors)
    }
}
