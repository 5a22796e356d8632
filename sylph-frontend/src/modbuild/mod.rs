//! Module building - from expanded AST to Module IR
//!
//! This module transforms the expanded s-expression forms into the
//! Module IR. It is a pure transformation: it resolves literals into
//! constants, assigns stable temp names, linearizes nested expressions
//! left-to-right, and synthesizes the alloca+store pattern for local
//! bindings (allocas are hoisted to the entry-block prologue, before
//! any block that may use them).

mod types;

pub use types::parse_type;

use log::debug;
use std::collections::HashMap;
use sylph_common::{CompilerError, TempId};

use crate::ast::Expr;
use crate::ir::{Function, IrBuilder, IrType, Module, Value};

/// A local mutable binding: the alloca'd cell and its element type
#[derive(Debug, Clone)]
struct LocalSlot {
    ptr: TempId,
    ty: IrType,
}

/// Builds one Module from a sequence of expanded top-level forms
pub struct ModuleBuilder {
    module: Module,
    builder: IrBuilder,
}

impl ModuleBuilder {
    pub fn new(module_name: String) -> Self {
        Self {
            module: Module::new(module_name),
            builder: IrBuilder::new(),
        }
    }

    /// Consume the expanded forms and produce the Module IR
    pub fn build(mut self, forms: &[Expr]) -> Result<Module, CompilerError> {
        // First pass: collect every signature so calls and forward
        // references resolve regardless of definition order.
        for form in forms {
            self.collect_signature(form)?;
        }

        // Second pass: lower function bodies.
        for form in forms {
            let Some(items) = form.as_list() else {
                continue;
            };
            if items.first().and_then(Expr::as_symbol) == Some("fn") {
                self.build_function(items)?;
            }
        }

        debug!(
            "built module `{}` with {} functions",
            self.module.name,
            self.module.functions.len()
        );
        Ok(self.module)
    }

    fn collect_signature(&mut self, form: &Expr) -> Result<(), CompilerError> {
        let items = form
            .as_list()
            .ok_or_else(|| CompilerError::unsupported(format!("unexpected atom `{form}`")))?;
        let head = items
            .first()
            .and_then(Expr::as_symbol)
            .ok_or_else(|| CompilerError::unsupported(format!("expected operation, got `{form}`")))?;

        let (function, is_definition) = match head {
            "extern" => (self.parse_extern(items)?, false),
            "fn" => (self.parse_fn_signature(items)?, true),
            other => {
                return Err(CompilerError::unsupported(format!(
                    "unknown top-level form `{other}`"
                )))
            }
        };

        match self.module.get_function(&function.name) {
            None => {
                self.module.add_function(function);
                Ok(())
            }
            Some(existing) => {
                if existing.fn_type() != function.fn_type() {
                    return Err(CompilerError::SignatureMismatch {
                        name: function.name.clone(),
                        expected: existing.fn_type().to_string(),
                        found: function.fn_type().to_string(),
                    });
                }
                if is_definition && !existing.is_external {
                    return Err(CompilerError::name_conflict(function.name));
                }
                if is_definition {
                    // A matching declaration is replaced by the definition
                    let slot = self.module.get_function_mut(&function.name).unwrap();
                    *slot = function;
                }
                Ok(())
            }
        }
    }

    /// `(extern NAME (TYPE*) RET)`; a trailing `...` marks varargs
    fn parse_extern(&self, items: &[Expr]) -> Result<Function, CompilerError> {
        let [_, name, params, ret] = items else {
            return Err(CompilerError::unsupported(
                "extern form must be (extern NAME (TYPE*) RET)",
            ));
        };
        let name = name
            .as_symbol()
            .ok_or_else(|| CompilerError::unsupported("extern name must be a symbol"))?;
        let mut param_list = params
            .as_list()
            .ok_or_else(|| CompilerError::unsupported("extern parameters must be a list"))?;

        let mut function = Function::new(name.to_string(), parse_type(ret)?);
        function.is_external = true;
        if param_list.last().and_then(Expr::as_symbol) == Some("...") {
            function.is_vararg = true;
            param_list = &param_list[..param_list.len() - 1];
        }
        for (index, param) in param_list.iter().enumerate() {
            function.add_parameter(index as TempId, parse_type(param)?);
        }
        Ok(function)
    }

    /// `(fn NAME ((PARAM TYPE)*) RET BODY*)` - signature part only
    fn parse_fn_signature(&self, items: &[Expr]) -> Result<Function, CompilerError> {
        if items.len() < 4 {
            return Err(CompilerError::unsupported(
                "fn form must be (fn NAME (PARAMS) RET BODY*)",
            ));
        }
        let name = items[1]
            .as_symbol()
            .ok_or_else(|| CompilerError::unsupported("fn name must be a symbol"))?;
        let params = items[2]
            .as_list()
            .ok_or_else(|| CompilerError::unsupported("fn parameters must be a list"))?;

        let mut function = Function::new(name.to_string(), parse_type(&items[3])?);
        function.is_external = true; // body attached in the second pass
        for (index, param) in params.iter().enumerate() {
            let Some([_, ty]) = param.as_list() else {
                return Err(CompilerError::unsupported(
                    "fn parameter must be (NAME TYPE)",
                ));
            };
            function.add_parameter(index as TempId, parse_type(ty)?);
        }
        Ok(function)
    }

    fn build_function(&mut self, items: &[Expr]) -> Result<(), CompilerError> {
        let name = items[1].as_symbol().unwrap().to_string();
        debug!("building function `{name}`");

        let signature = self.module.get_function(&name).unwrap().clone();
        self.builder
            .create_function(name.clone(), signature.return_type.clone());

        let params = items[2].as_list().unwrap();
        let mut scope: HashMap<String, LocalSlot> = HashMap::new();
        let mut param_temps: HashMap<String, (TempId, IrType)> = HashMap::new();
        for param in params {
            let [param_name, ty] = param.as_list().unwrap() else {
                unreachable!("checked in parse_fn_signature");
            };
            let param_name = param_name
                .as_symbol()
                .ok_or_else(|| CompilerError::unsupported("fn parameter name must be a symbol"))?;
            let ty = parse_type(ty)?;
            let temp = self.builder.add_parameter(ty.clone());
            if param_temps
                .insert(param_name.to_string(), (temp, ty))
                .is_some()
            {
                return Err(CompilerError::name_conflict(param_name));
            }
        }

        let entry = self.builder.new_label();
        self.builder.create_block(entry).map_err(internal)?;

        let mut ctx = FnContext {
            scope: &mut scope,
            params: &param_temps,
            return_type: signature.return_type.clone(),
        };

        let body = &items[4..];
        for form in body {
            if !self.builder_block_open() {
                return Err(CompilerError::unsupported(format!(
                    "unreachable code after a terminator: `{form}`"
                )));
            }
            self.build_expr(&mut ctx, form)?;
        }

        if self.builder_block_open() {
            if ctx.return_type == IrType::Void {
                self.builder.build_ret(None).map_err(internal)?;
            } else {
                return Err(CompilerError::unsupported(format!(
                    "function `{name}` falls off the end without (ret ...)"
                )));
            }
        }

        let mut built = self.builder.finish_function().unwrap();
        built.is_vararg = signature.is_vararg;
        let slot = self.module.get_function_mut(&name).unwrap();
        built.is_external = false;
        *slot = built;
        Ok(())
    }

    fn builder_block_open(&self) -> bool {
        !self.builder.current_block_has_terminator()
    }

    /// Lower one expression, returning its value (None for void) and
    /// type. Nested expressions are linearized in evaluation order.
    fn build_expr(
        &mut self,
        ctx: &mut FnContext<'_>,
        expr: &Expr,
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        match expr {
            Expr::Int(value) => Ok((Some(Value::const_i32(*value)), IrType::i32())),
            Expr::Str(content) => Ok((
                Some(Value::Str(content.clone())),
                IrType::ptr(IrType::i8()),
            )),
            Expr::Symbol(name) => self.build_symbol(ctx, name),
            Expr::List(items) => self.build_list(ctx, items),
        }
    }

    fn build_symbol(
        &mut self,
        ctx: &mut FnContext<'_>,
        name: &str,
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        if let Some(slot) = ctx.scope.get(name) {
            let (ptr, ty) = (slot.ptr, slot.ty.clone());
            let loaded = self
                .builder
                .build_load(Value::Temp(ptr), ty.clone())
                .map_err(internal)?;
            return Ok((Some(Value::Temp(loaded)), ty));
        }
        if let Some((temp, ty)) = ctx.params.get(name) {
            return Ok((Some(Value::Temp(*temp)), ty.clone()));
        }
        Err(CompilerError::unsupported(format!(
            "unknown variable `{name}`"
        )))
    }

    fn build_list(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let head = items
            .first()
            .and_then(Expr::as_symbol)
            .ok_or_else(|| CompilerError::unsupported("operation head must be a symbol"))?;

        match head {
            "let" => self.build_let(ctx, items),
            "set" => self.build_set(ctx, items),
            "ret" => self.build_ret(ctx, items),
            "if" => self.build_if(ctx, items),
            "call" => self.build_call(ctx, &items[1..]),
            "gep" => self.build_gep(ctx, items),
            "load" => self.build_load(ctx, items),
            "store" => self.build_store(ctx, items),
            "addr" => self.build_addr(ctx, items),
            "null" => {
                let [_, ty] = items else {
                    return Err(CompilerError::unsupported("null form must be (null TYPE)"));
                };
                let ty = parse_type(ty)?;
                if !ty.is_pointer() {
                    return Err(CompilerError::unsupported(
                        "null requires a pointer type",
                    ));
                }
                Ok((Some(Value::ConstNull(ty.clone())), ty))
            }
            "undef" => {
                let [_, ty] = items else {
                    return Err(CompilerError::unsupported(
                        "undef form must be (undef TYPE)",
                    ));
                };
                let ty = parse_type(ty)?;
                Ok((Some(Value::Undef(ty.clone())), ty))
            }
            // (i8 65) and friends: width-explicit integer constant
            _ if types::is_int_type_name(head) => {
                let ty = parse_type(&items[0])?;
                let [_, Expr::Int(value)] = items else {
                    return Err(CompilerError::unsupported(format!(
                        "({head} N) requires one integer literal"
                    )));
                };
                Ok((
                    Some(Value::ConstInt {
                        ty: ty.clone(),
                        value: *value,
                        sign_extend: true,
                    }),
                    ty,
                ))
            }
            // (NAME ARGS*) sugar for calling a known function
            _ if self.module.get_function(head).is_some() => self.build_call(ctx, items),
            other => Err(CompilerError::unsupported(format!(
                "unknown operation `{other}`"
            ))),
        }
    }

    /// `(let NAME TYPE EXPR)` - allocate a cell in the entry prologue,
    /// evaluate the initializer, store it
    fn build_let(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, name, ty, init] = items else {
            return Err(CompilerError::unsupported(
                "let form must be (let NAME TYPE EXPR)",
            ));
        };
        let name = name
            .as_symbol()
            .ok_or_else(|| CompilerError::unsupported("let name must be a symbol"))?;
        if ctx.scope.contains_key(name) || ctx.params.contains_key(name) {
            return Err(CompilerError::name_conflict(name));
        }
        let ty = parse_type(ty)?;

        let (value, found) = self.build_value(ctx, init)?;
        let value = coerce(value, &found, &ty)?;
        let ptr = self.builder.build_entry_alloca(ty.clone()).map_err(internal)?;
        self.builder
            .build_store(value, Value::Temp(ptr))
            .map_err(internal)?;

        ctx.scope.insert(
            name.to_string(),
            LocalSlot {
                ptr,
                ty,
            },
        );
        Ok((None, IrType::Void))
    }

    /// `(set NAME EXPR)`
    fn build_set(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, name, expr] = items else {
            return Err(CompilerError::unsupported(
                "set form must be (set NAME EXPR)",
            ));
        };
        let name = name
            .as_symbol()
            .ok_or_else(|| CompilerError::unsupported("set name must be a symbol"))?;
        let Some(slot) = ctx.scope.get(name) else {
            return Err(CompilerError::unsupported(format!(
                "set of unknown or immutable binding `{name}`"
            )));
        };
        let (ptr, ty) = (slot.ptr, slot.ty.clone());

        let (value, found) = self.build_value(ctx, expr)?;
        let value = coerce(value, &found, &ty)?;
        self.builder
            .build_store(value, Value::Temp(ptr))
            .map_err(internal)?;
        Ok((None, IrType::Void))
    }

    /// `(ret)` or `(ret EXPR)`
    fn build_ret(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        match items {
            [_] => {
                if ctx.return_type != IrType::Void {
                    return Err(CompilerError::unsupported(
                        "(ret) in a function with a non-void return type",
                    ));
                }
                self.builder.build_ret(None).map_err(internal)?;
            }
            [_, expr] => {
                let expected = ctx.return_type.clone();
                let (value, found) = self.build_value(ctx, expr)?;
                let value = coerce(value, &found, &expected)?;
                self.builder.build_ret(Some(value)).map_err(internal)?;
            }
            _ => {
                return Err(CompilerError::unsupported(
                    "ret form must be (ret) or (ret EXPR)",
                ))
            }
        }
        Ok((None, IrType::Void))
    }

    /// `(if COND (THEN*) (ELSE*))` - multi-block control flow
    fn build_if(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, cond, then_forms, else_forms] = items else {
            return Err(CompilerError::unsupported(
                "if form must be (if COND (THEN*) (ELSE*))",
            ));
        };
        let (cond_value, cond_ty) = self.build_value(ctx, cond)?;
        if !cond_ty.is_integer() {
            return Err(CompilerError::unsupported(format!(
                "if condition must be an integer, got {cond_ty}"
            )));
        }

        let then_label = self.builder.new_label();
        let else_label = self.builder.new_label();
        let join_label = self.builder.new_label();
        self.builder
            .build_br_cond(cond_value, then_label, else_label)
            .map_err(internal)?;

        let mut fell_through = false;
        for (label, forms) in [(then_label, then_forms), (else_label, else_forms)] {
            self.builder.create_block(label).map_err(internal)?;
            let arm = forms
                .as_list()
                .ok_or_else(|| CompilerError::unsupported("if arm must be a list of forms"))?;
            for form in arm {
                if !self.builder_block_open() {
                    return Err(CompilerError::unsupported(format!(
                        "unreachable code after a terminator: `{form}`"
                    )));
                }
                self.build_expr(ctx, form)?;
            }
            if self.builder_block_open() {
                self.builder.build_br(join_label).map_err(internal)?;
                fell_through = true;
            }
        }

        if fell_through {
            self.builder.create_block(join_label).map_err(internal)?;
        }
        Ok((None, IrType::Void))
    }

    /// `(call NAME ARGS*)` or the `(NAME ARGS*)` sugar
    fn build_call(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let name = items
            .first()
            .and_then(Expr::as_symbol)
            .ok_or_else(|| CompilerError::unsupported("call target must be a symbol"))?
            .to_string();
        let Some(signature) = self.module.get_function(&name) else {
            return Err(CompilerError::unsupported(format!(
                "call to unknown function `{name}`"
            )));
        };
        let param_types: Vec<IrType> = signature
            .parameters
            .iter()
            .map(|(_, ty)| ty.clone())
            .collect();
        let is_vararg = signature.is_vararg;
        let return_type = signature.return_type.clone();

        let args = &items[1..];
        let arity_ok = if is_vararg {
            args.len() >= param_types.len()
        } else {
            args.len() == param_types.len()
        };
        if !arity_ok {
            return Err(CompilerError::unsupported(format!(
                "call to `{name}` with {} arguments, expected {}",
                args.len(),
                param_types.len()
            )));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let (value, found) = self.build_value(ctx, arg)?;
            let value = match param_types.get(index) {
                Some(expected) => coerce(value, &found, expected)?,
                None => value, // vararg tail keeps its own type
            };
            lowered.push(value);
        }

        let result = self
            .builder
            .build_call(name, lowered, return_type.clone())
            .map_err(internal)?;
        Ok((result.map(Value::Temp), return_type))
    }

    /// `(gep BASE IDX*)`
    fn build_gep(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        if items.len() < 3 {
            return Err(CompilerError::unsupported(
                "gep form must be (gep BASE IDX+)",
            ));
        }
        let (base, base_ty) = self.build_value(ctx, &items[1])?;
        if !base_ty.is_pointer() {
            return Err(CompilerError::unsupported(format!(
                "gep base must be a pointer, got {base_ty}"
            )));
        }
        let mut indices = Vec::new();
        for index in &items[2..] {
            let (value, found) = self.build_value(ctx, index)?;
            if !found.is_integer() {
                return Err(CompilerError::unsupported(format!(
                    "gep index must be an integer, got {found}"
                )));
            }
            indices.push(value);
        }
        let (result, result_type) = self
            .builder
            .build_gep(base, &base_ty, indices)
            .map_err(|e| CompilerError::unsupported(e))?;
        Ok((Some(Value::Temp(result)), result_type))
    }

    /// `(load PTR)`
    fn build_load(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, ptr] = items else {
            return Err(CompilerError::unsupported("load form must be (load PTR)"));
        };
        let (ptr_value, ptr_ty) = self.build_value(ctx, ptr)?;
        let Some(pointee) = ptr_ty.pointee().cloned() else {
            return Err(CompilerError::unsupported(format!(
                "load requires a pointer, got {ptr_ty}"
            )));
        };
        let result = self
            .builder
            .build_load(ptr_value, pointee.clone())
            .map_err(internal)?;
        Ok((Some(Value::Temp(result)), pointee))
    }

    /// `(store VALUE PTR)`
    fn build_store(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, value, ptr] = items else {
            return Err(CompilerError::unsupported(
                "store form must be (store VALUE PTR)",
            ));
        };
        let (value, value_ty) = self.build_value(ctx, value)?;
        let (ptr_value, ptr_ty) = self.build_value(ctx, ptr)?;
        let Some(pointee) = ptr_ty.pointee() else {
            return Err(CompilerError::unsupported(format!(
                "store target must be a pointer, got {ptr_ty}"
            )));
        };
        let value = coerce(value, &value_ty, &pointee.clone())?;
        self.builder
            .build_store(value, ptr_value)
            .map_err(internal)?;
        Ok((None, IrType::Void))
    }

    /// `(addr NAME)` - address of a local binding's cell
    fn build_addr(
        &mut self,
        ctx: &mut FnContext<'_>,
        items: &[Expr],
    ) -> Result<(Option<Value>, IrType), CompilerError> {
        let [_, name] = items else {
            return Err(CompilerError::unsupported("addr form must be (addr NAME)"));
        };
        let name = name
            .as_symbol()
            .ok_or_else(|| CompilerError::unsupported("addr name must be a symbol"))?;
        let Some(slot) = ctx.scope.get(name) else {
            return Err(CompilerError::unsupported(format!(
                "addr of unknown binding `{name}`"
            )));
        };
        Ok((
            Some(Value::Temp(slot.ptr)),
            IrType::ptr(slot.ty.clone()),
        ))
    }

    /// Like `build_expr` but in a context where void is not allowed
    fn build_value(
        &mut self,
        ctx: &mut FnContext<'_>,
        expr: &Expr,
    ) -> Result<(Value, IrType), CompilerError> {
        let (value, ty) = self.build_expr(ctx, expr)?;
        match value {
            Some(value) => Ok((value, ty)),
            None => Err(CompilerError::unsupported(format!(
                "form `{expr}` produces no value"
            ))),
        }
    }
}

struct FnContext<'a> {
    scope: &'a mut HashMap<String, LocalSlot>,
    params: &'a HashMap<String, (TempId, IrType)>,
    return_type: IrType,
}

/// Integer literals default to i32; a constant flows into a narrower
/// or wider integer context by retyping, anything else must match
/// structurally.
fn coerce(value: Value, found: &IrType, expected: &IrType) -> Result<Value, CompilerError> {
    if found == expected {
        return Ok(value);
    }
    if let (Value::ConstInt { value, sign_extend, .. }, IrType::Int { .. }) = (&value, expected) {
        return Ok(Value::ConstInt {
            ty: expected.clone(),
            value: *value,
            sign_extend: *sign_extend,
        });
    }
    Err(CompilerError::unsupported(format!(
        "type mismatch: expected {expected}, found {found}"
    )))
}

fn internal(message: String) -> CompilerError {
    CompilerError::InternalError { message }
}

#[cfg(test)]
mod tests;
