//! Basic Block Management
//!
//! Defines basic blocks - non-empty instruction sequences ending in
//! exactly one terminator. Successor edges are computed from the
//! terminator rather than stored.

use serde::{Deserialize, Serialize};
use sylph_common::LabelId;

use crate::ir::Instruction;

/// Basic Block - a sequence of instructions with a single entry and exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: LabelId,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: LabelId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions
            .last()
            .is_some_and(|instr| instr.is_terminator())
    }

    /// Successor blocks named by this block's terminator
    pub fn successors(&self) -> Vec<LabelId> {
        match self.instructions.last() {
            Some(Instruction::Br(target)) => vec![*target],
            Some(Instruction::BrCond {
                then_block,
                else_block,
                ..
            }) => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}
