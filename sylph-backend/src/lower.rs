//! Module IR to native IR lowering
//!
//! One pass in module order. Structurally equal IR types collapse to
//! one native type handle through a memo table, functions are declared
//! before any body is lowered so calls and forward branches always
//! resolve, and every function body is verified natively before the
//! final whole-module verification.

use std::collections::HashMap;

use log::debug;
use sylph_common::{CompilerError, LabelId, TempId};
use sylph_frontend::ir::{Function, Instruction, IrType, Module, Value};

use crate::ffi::LibLlvm;
use crate::handles::{
    BlockHandle, BuilderHandle, ContextHandle, ModuleHandle, TypeHandle, ValueHandle,
};

/// Owner of the native context/module/builder trio.
///
/// Release is idempotent and runs in reverse acquisition order; `Drop`
/// covers the early-error paths so no exit leaks native objects.
struct Session<'a> {
    lib: &'a LibLlvm,
    context: Option<ContextHandle>,
    module: Option<ModuleHandle>,
    builder: Option<BuilderHandle>,
}

impl<'a> Session<'a> {
    fn open(lib: &'a LibLlvm, module_name: &str) -> Result<Self, CompilerError> {
        let mut session = Self {
            lib,
            context: None,
            module: None,
            builder: None,
        };
        let context = lib.context_create()?;
        session.context = Some(context);
        session.module = Some(lib.module_create(module_name, context)?);
        session.builder = Some(lib.builder_create(context)?);
        Ok(session)
    }

    fn context(&self) -> ContextHandle {
        self.context.unwrap_or_else(|| unreachable!("session released"))
    }

    fn module(&self) -> ModuleHandle {
        self.module.unwrap_or_else(|| unreachable!("session released"))
    }

    fn builder(&self) -> BuilderHandle {
        self.builder.unwrap_or_else(|| unreachable!("session released"))
    }

    fn release(&mut self) {
        if let Some(builder) = self.builder.take() {
            self.lib.builder_dispose(builder);
        }
        if let Some(module) = self.module.take() {
            self.lib.module_dispose(module);
        }
        if let Some(context) = self.context.take() {
            self.lib.context_dispose(context);
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Lower `module` through the native library and return its textual
/// IR. The native context is torn down before returning, on success
/// and on failure alike.
pub fn lower_module(lib: &LibLlvm, module: &Module) -> Result<String, CompilerError> {
    let mut session = Session::open(lib, &module.name)?;
    let text = Lowering::new(lib, &session).run(module)?;
    session.release();
    Ok(text)
}

struct Lowering<'a> {
    lib: &'a LibLlvm,
    context: ContextHandle,
    module: ModuleHandle,
    builder: BuilderHandle,
    /// Structural type identity: one native handle per distinct IrType
    type_memo: HashMap<IrType, TypeHandle>,
    /// Declared functions: native value + native function type
    functions: HashMap<String, (ValueHandle, TypeHandle)>,
    /// Interned string literals
    strings: HashMap<String, ValueHandle>,
}

impl<'a> Lowering<'a> {
    fn new(lib: &'a LibLlvm, session: &Session<'a>) -> Self {
        Self {
            lib,
            context: session.context(),
            module: session.module(),
            builder: session.builder(),
            type_memo: HashMap::new(),
            functions: HashMap::new(),
            strings: HashMap::new(),
        }
    }

    fn run(&mut self, module: &Module) -> Result<String, CompilerError> {
        // Declarations first, so calls and mutual recursion resolve
        // regardless of definition order.
        for function in &module.functions {
            self.declare_function(function)?;
        }
        for function in &module.functions {
            if function.is_defined() {
                self.lower_body(function)?;
            }
        }

        self.lib
            .verify_module(self.module)
            .map_err(|message| CompilerError::VerificationFailed { message })?;
        self.lib.print_module(self.module)
    }

    fn declare_function(&mut self, function: &Function) -> Result<(), CompilerError> {
        let fn_type = function.fn_type();
        let native_type = self.lower_type(&fn_type)?;
        if self.functions.contains_key(&function.name) {
            return Err(CompilerError::SignatureMismatch {
                name: function.name.clone(),
                expected: "a single declaration".to_string(),
                found: "a duplicate declaration".to_string(),
            });
        }
        let value = self
            .lib
            .add_function(self.module, &function.name, native_type)?;
        self.functions
            .insert(function.name.clone(), (value, native_type));
        debug!("declared `{}` as {fn_type}", function.name);
        Ok(())
    }

    fn lower_type(&mut self, ty: &IrType) -> Result<TypeHandle, CompilerError> {
        if let Some(handle) = self.type_memo.get(ty) {
            return Ok(*handle);
        }
        let handle = match ty {
            IrType::Void => self.lib.void_type(self.context)?,
            IrType::Int { bits } => self.lib.int_type(self.context, *bits)?,
            IrType::Ptr(pointee) => {
                let pointee = self.lower_type(pointee)?;
                self.lib.pointer_type(pointee)?
            }
            IrType::Array { element, size } => {
                let element = self.lower_type(element)?;
                self.lib.array_type(element, *size)?
            }
            IrType::Function {
                return_type,
                param_types,
                is_vararg,
            } => {
                let return_type = self.lower_type(return_type)?;
                let params = param_types
                    .iter()
                    .map(|p| self.lower_type(p))
                    .collect::<Result<Vec<_>, _>>()?;
                self.lib.function_type(return_type, &params, *is_vararg)?
            }
        };
        self.type_memo.insert(ty.clone(), handle);
        Ok(handle)
    }

    fn lower_body(&mut self, function: &Function) -> Result<(), CompilerError> {
        debug!("lowering body of `{}`", function.name);
        let (native_fn, _) = self.functions[&function.name];

        let mut frame = FnFrame::default();
        for (index, (temp, ty)) in function.parameters.iter().enumerate() {
            let value = self.lib.get_param(native_fn, index as u32)?;
            frame.values.insert(*temp, value);
            frame.types.insert(*temp, ty.clone());
        }

        // All native blocks exist before any instruction, so forward
        // branch targets are always resolvable.
        for block in &function.blocks {
            let handle =
                self.lib
                    .append_block(self.context, native_fn, &format!("bb{}", block.id))?;
            frame.blocks.insert(block.id, handle);
        }

        for block in &function.blocks {
            self.lib.position_at_end(self.builder, frame.blocks[&block.id]);
            for instr in &block.instructions {
                self.lower_instruction(function, instr, &mut frame)?;
            }
        }

        if !self.lib.verify_function(native_fn) {
            return Err(CompilerError::VerificationFailed {
                message: format!("function `{}` failed native verification", function.name),
            });
        }
        Ok(())
    }

    fn lower_instruction(
        &mut self,
        function: &Function,
        instr: &Instruction,
        frame: &mut FnFrame,
    ) -> Result<(), CompilerError> {
        match instr {
            Instruction::Alloca { result, alloc_type } => {
                let ty = self.lower_type(alloc_type)?;
                let value = self.lib.build_alloca(self.builder, ty, "")?;
                frame.define(*result, value, IrType::Ptr(Box::new(alloc_type.clone())));
            }
            Instruction::Store { value, ptr } => {
                let value = self.lower_value(value, frame)?;
                let ptr = self.lower_value(ptr, frame)?;
                self.lib.build_store(self.builder, value, ptr)?;
            }
            Instruction::Load {
                result,
                ptr,
                result_type,
            } => {
                let ty = self.lower_type(result_type)?;
                let ptr = self.lower_value(ptr, frame)?;
                let value = self.lib.build_load(self.builder, ty, ptr, "")?;
                frame.define(*result, value, result_type.clone());
            }
            Instruction::GetElementPtr {
                result,
                base,
                indices,
                result_type,
            } => {
                let base_ty = self.value_type(base, frame)?;
                let Some(pointee) = base_ty.pointee() else {
                    return Err(CompilerError::InternalError {
                        message: format!("getelementptr base has type {base_ty}"),
                    });
                };
                let pointee = self.lower_type(&pointee.clone())?;
                let base = self.lower_value(base, frame)?;
                let indices = indices
                    .iter()
                    .map(|i| self.lower_value(i, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = self
                    .lib
                    .build_gep(self.builder, pointee, base, &indices, "")?;
                frame.define(*result, value, result_type.clone());
            }
            Instruction::Call {
                result,
                callee,
                args,
                result_type,
            } => {
                let Some(&(fn_value, fn_type)) = self.functions.get(callee) else {
                    return Err(CompilerError::InternalError {
                        message: format!("call to undeclared function `{callee}`"),
                    });
                };
                let args = args
                    .iter()
                    .map(|a| self.lower_value(a, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = self
                    .lib
                    .build_call(self.builder, fn_type, fn_value, &args, "")?;
                if let Some(result) = result {
                    frame.define(*result, value, result_type.clone());
                }
            }
            Instruction::Ret(value) => {
                let value = match value {
                    Some(value) => Some(self.lower_value(value, frame)?),
                    None => None,
                };
                self.lib.build_ret(self.builder, value)?;
            }
            Instruction::Br(target) => {
                let target = frame.block(*target, function)?;
                self.lib.build_br(self.builder, target)?;
            }
            Instruction::BrCond {
                condition,
                then_block,
                else_block,
            } => {
                // The native conditional branch takes an i1; compare
                // the wide condition against zero of its own width.
                let cond_ty = self.value_type(condition, frame)?;
                let zero = self.lib.const_int(self.lower_type(&cond_ty)?, 0, false)?;
                let condition = self.lower_value(condition, frame)?;
                let flag = self
                    .lib
                    .build_icmp_ne(self.builder, condition, zero, "")?;
                let then_block = frame.block(*then_block, function)?;
                let else_block = frame.block(*else_block, function)?;
                self.lib
                    .build_cond_br(self.builder, flag, then_block, else_block)?;
            }
        }
        Ok(())
    }

    fn lower_value(
        &mut self,
        value: &Value,
        frame: &FnFrame,
    ) -> Result<ValueHandle, CompilerError> {
        match value {
            Value::Temp(id) => frame.values.get(id).copied().ok_or_else(|| {
                CompilerError::InternalError {
                    message: format!("use of unlowered value %{id}"),
                }
            }),
            Value::ConstInt {
                ty,
                value,
                sign_extend,
            } => {
                let ty = self.lower_type(ty)?;
                self.lib.const_int(ty, *value as u64, *sign_extend)
            }
            Value::ConstNull(ty) => {
                let ty = self.lower_type(ty)?;
                self.lib.const_null(ty)
            }
            Value::Undef(ty) => {
                let ty = self.lower_type(ty)?;
                self.lib.get_undef(ty)
            }
            Value::Str(content) => {
                if let Some(handle) = self.strings.get(content) {
                    return Ok(*handle);
                }
                let handle = self
                    .lib
                    .build_global_string(self.builder, content, ".str")?;
                self.strings.insert(content.clone(), handle);
                Ok(handle)
            }
        }
    }

    /// The IR type of a value in the current frame
    fn value_type(&self, value: &Value, frame: &FnFrame) -> Result<IrType, CompilerError> {
        match value {
            Value::Temp(id) => frame.types.get(id).cloned().ok_or_else(|| {
                CompilerError::InternalError {
                    message: format!("unknown type for %{id}"),
                }
            }),
            other => other.const_type().ok_or_else(|| CompilerError::InternalError {
                message: format!("value `{other}` has no type"),
            }),
        }
    }
}

/// Per-function lowering state
#[derive(Default)]
struct FnFrame {
    values: HashMap<TempId, ValueHandle>,
    types: HashMap<TempId, IrType>,
    blocks: HashMap<LabelId, BlockHandle>,
}

impl FnFrame {
    fn define(&mut self, temp: TempId, value: ValueHandle, ty: IrType) {
        self.values.insert(temp, value);
        self.types.insert(temp, ty);
    }

    fn block(&self, id: LabelId, function: &Function) -> Result<BlockHandle, CompilerError> {
        self.blocks
            .get(&id)
            .copied()
            .ok_or_else(|| CompilerError::InternalError {
                message: format!("branch to unknown block bb{id} in `{}`", function.name),
            })
    }
}
