//! Function Definitions
//!
//! Defines IR functions with their parameters and blocks. A function is
//! either declared (signature only, `is_external`) or defined (at least
//! one block).

use serde::{Deserialize, Serialize};
use std::fmt;
use sylph_common::{LabelId, TempId};

use crate::ir::{BasicBlock, IrType};

/// Function in IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: IrType,
    pub parameters: Vec<(TempId, IrType)>,
    pub blocks: Vec<BasicBlock>,
    pub is_external: bool,
    pub is_vararg: bool,
}

impl Function {
    pub fn new(name: String, return_type: IrType) -> Self {
        Self {
            name,
            return_type,
            parameters: Vec::new(),
            blocks: Vec::new(),
            is_external: false,
            is_vararg: false,
        }
    }

    pub fn add_parameter(&mut self, param_id: TempId, param_type: IrType) {
        self.parameters.push((param_id, param_type));
    }

    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.push(block);
    }

    pub fn get_block(&self, id: LabelId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn get_block_mut(&mut self, id: LabelId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Whether this function has a body
    pub fn is_defined(&self) -> bool {
        !self.is_external && !self.blocks.is_empty()
    }

    /// The `Function` type of this function's signature
    pub fn fn_type(&self) -> IrType {
        IrType::Function {
            return_type: Box::new(self.return_type.clone()),
            param_types: self.parameters.iter().map(|(_, ty)| ty.clone()).collect(),
            is_vararg: self.is_vararg,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_defined() { "define" } else { "declare" };
        write!(f, "{kind} {} @{}(", self.return_type, self.name)?;
        for (i, (id, ty)) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty} %{id}")?;
        }
        if self.is_vararg {
            write!(f, ", ...")?;
        }
        write!(f, ")")?;
        if !self.is_defined() {
            return Ok(());
        }
        writeln!(f, " {{")?;
        for block in &self.blocks {
            writeln!(f, "bb{}:", block.id)?;
            for instr in &block.instructions {
                writeln!(f, "  {instr}")?;
            }
        }
        write!(f, "}}")
    }
}
