//! IR Builder
//!
//! Provides utilities for constructing IR programmatically. The builder
//! owns one function at a time and appends into a current block; the
//! ModuleBuilder and the tests drive it.

use sylph_common::{LabelId, TempId};

use crate::ir::{gep_result_type, BasicBlock, Function, Instruction, IrType, Value};

/// Builder for constructing IR
pub struct IrBuilder {
    current_function: Option<Function>,
    current_block: Option<LabelId>,
    next_temp_id: TempId,
    next_label_id: LabelId,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self {
            current_function: None,
            current_block: None,
            next_temp_id: 0,
            next_label_id: 0,
        }
    }

    pub fn new_temp(&mut self) -> TempId {
        let temp = self.next_temp_id;
        self.next_temp_id += 1;
        temp
    }

    pub fn new_label(&mut self) -> LabelId {
        let label = self.next_label_id;
        self.next_label_id += 1;
        label
    }

    pub fn create_function(&mut self, name: String, return_type: IrType) -> &mut Function {
        let function = Function::new(name, return_type);
        self.current_function = Some(function);
        // Temps and labels are numbered per function
        self.next_temp_id = 0;
        self.next_label_id = 0;
        self.current_block = None;
        self.current_function.as_mut().unwrap()
    }

    /// Add a parameter to the current function, returning its temp
    pub fn add_parameter(&mut self, param_type: IrType) -> TempId {
        let param_id = self.new_temp();
        if let Some(ref mut function) = self.current_function {
            function.add_parameter(param_id, param_type);
        }
        param_id
    }

    pub fn create_block(&mut self, label_id: LabelId) -> Result<(), String> {
        let block = BasicBlock::new(label_id);
        if let Some(ref mut function) = self.current_function {
            function.add_block(block);
            self.current_block = Some(label_id);
            Ok(())
        } else {
            Err("No current function".to_string())
        }
    }

    /// Switch the insertion point to an existing block
    pub fn position_at(&mut self, label_id: LabelId) -> Result<(), String> {
        let function = self
            .current_function
            .as_ref()
            .ok_or_else(|| "No current function".to_string())?;
        if function.get_block(label_id).is_none() {
            return Err(format!("No block bb{label_id} in current function"));
        }
        self.current_block = Some(label_id);
        Ok(())
    }

    pub fn build_alloca(&mut self, alloc_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Alloca { result, alloc_type })?;
        Ok(result)
    }

    /// Insert an alloca at the top of the entry block, before any
    /// instruction that may use it. Local bindings are allocated this
    /// way because the native backend expects allocas to precede their
    /// first use.
    pub fn build_entry_alloca(&mut self, alloc_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        let function = self
            .current_function
            .as_mut()
            .ok_or_else(|| "No current function".to_string())?;
        let entry = function
            .blocks
            .first_mut()
            .ok_or_else(|| "No entry block".to_string())?;
        let at = entry
            .instructions
            .iter()
            .position(|i| !matches!(i, Instruction::Alloca { .. }))
            .unwrap_or(entry.instructions.len());
        entry
            .instructions
            .insert(at, Instruction::Alloca { result, alloc_type });
        Ok(result)
    }

    pub fn build_store(&mut self, value: Value, ptr: Value) -> Result<(), String> {
        self.add_instruction(Instruction::Store { value, ptr })
    }

    pub fn build_load(&mut self, ptr: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.add_instruction(Instruction::Load {
            result,
            ptr,
            result_type,
        })?;
        Ok(result)
    }

    /// Build a getelementptr; `base_type` is the pointer type of `base`
    /// and the result type is derived from it and the index count.
    pub fn build_gep(
        &mut self,
        base: Value,
        base_type: &IrType,
        indices: Vec<Value>,
    ) -> Result<(TempId, IrType), String> {
        let result_type = gep_result_type(base_type, indices.len())
            .ok_or_else(|| format!("invalid getelementptr through {base_type}"))?;
        let result = self.new_temp();
        self.add_instruction(Instruction::GetElementPtr {
            result,
            base,
            indices,
            result_type: result_type.clone(),
        })?;
        Ok((result, result_type))
    }

    pub fn build_call(
        &mut self,
        callee: String,
        args: Vec<Value>,
        result_type: IrType,
    ) -> Result<Option<TempId>, String> {
        let result = if matches!(result_type, IrType::Void) {
            None
        } else {
            Some(self.new_temp())
        };
        self.add_instruction(Instruction::Call {
            result,
            callee,
            args,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_ret(&mut self, value: Option<Value>) -> Result<(), String> {
        self.add_instruction(Instruction::Ret(value))
    }

    pub fn build_br(&mut self, label: LabelId) -> Result<(), String> {
        self.add_instruction(Instruction::Br(label))
    }

    pub fn build_br_cond(
        &mut self,
        condition: Value,
        then_block: LabelId,
        else_block: LabelId,
    ) -> Result<(), String> {
        self.add_instruction(Instruction::BrCond {
            condition,
            then_block,
            else_block,
        })
    }

    fn add_instruction(&mut self, instr: Instruction) -> Result<(), String> {
        let function = self
            .current_function
            .as_mut()
            .ok_or_else(|| "No current function".to_string())?;
        let block_id = self
            .current_block
            .ok_or_else(|| "No current block".to_string())?;
        let block = function
            .get_block_mut(block_id)
            .ok_or_else(|| "Current block not found".to_string())?;
        if block.has_terminator() {
            return Err(format!(
                "Block bb{block_id} already has a terminator"
            ));
        }
        block.add_instruction(instr);
        Ok(())
    }

    pub fn current_block_has_terminator(&self) -> bool {
        let Some(ref function) = self.current_function else {
            return false;
        };
        let Some(block_id) = self.current_block else {
            return false;
        };
        function
            .get_block(block_id)
            .is_some_and(|b| b.has_terminator())
    }

    pub fn finish_function(&mut self) -> Option<Function> {
        self.current_block = None;
        self.current_function.take()
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}
