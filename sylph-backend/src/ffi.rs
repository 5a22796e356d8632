//! The native LLVM-C binding
//!
//! The library is opened at runtime from a configurable path; every
//! symbol is resolved once at load time against signatures fixed at
//! compile time. All raw-pointer traffic stays inside this module -
//! the rest of the crate only sees [`Handle`]s and `Result`s.

use std::ffi::{c_char, c_int, c_uint, c_void, CString};

use libloading::Library;
use log::debug;
use sylph_common::CompilerError;

use crate::handles::{
    marshal, BlockHandle, BuilderHandle, ContextHandle, Handle, ModuleHandle, TypeHandle,
    ValueHandle,
};

// LLVMVerifierFailureAction::LLVMReturnStatusAction
const RETURN_STATUS_ACTION: c_int = 2;
// LLVMIntPredicate::LLVMIntNE
const INT_NE: c_int = 33;

type ContextCreateFn = unsafe extern "C" fn() -> *mut c_void;
type ContextDisposeFn = unsafe extern "C" fn(*mut c_void);
type ModuleCreateFn = unsafe extern "C" fn(*const c_char, *mut c_void) -> *mut c_void;
type ModuleDisposeFn = unsafe extern "C" fn(*mut c_void);
type BuilderCreateFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type BuilderDisposeFn = unsafe extern "C" fn(*mut c_void);
type VoidTypeFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type IntTypeFn = unsafe extern "C" fn(*mut c_void, c_uint) -> *mut c_void;
type PointerTypeFn = unsafe extern "C" fn(*mut c_void, c_uint) -> *mut c_void;
type ArrayTypeFn = unsafe extern "C" fn(*mut c_void, u64) -> *mut c_void;
type FunctionTypeFn =
    unsafe extern "C" fn(*mut c_void, *mut *mut c_void, c_uint, c_int) -> *mut c_void;
type AddFunctionFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_void) -> *mut c_void;
type GetParamFn = unsafe extern "C" fn(*mut c_void, c_uint) -> *mut c_void;
type AppendBlockFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *const c_char) -> *mut c_void;
type PositionAtEndFn = unsafe extern "C" fn(*mut c_void, *mut c_void);
type ConstIntFn = unsafe extern "C" fn(*mut c_void, u64, c_int) -> *mut c_void;
type ConstNullFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type GetUndefFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type BuildAllocaFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *const c_char) -> *mut c_void;
type BuildStoreFn = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> *mut c_void;
type BuildLoadFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void, *const c_char) -> *mut c_void;
type BuildGepFn = unsafe extern "C" fn(
    *mut c_void,
    *mut c_void,
    *mut c_void,
    *mut *mut c_void,
    c_uint,
    *const c_char,
) -> *mut c_void;
type BuildCallFn = unsafe extern "C" fn(
    *mut c_void,
    *mut c_void,
    *mut c_void,
    *mut *mut c_void,
    c_uint,
    *const c_char,
) -> *mut c_void;
type BuildRetFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> *mut c_void;
type BuildRetVoidFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type BuildBrFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> *mut c_void;
type BuildCondBrFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void, *mut c_void) -> *mut c_void;
type BuildICmpFn = unsafe extern "C" fn(
    *mut c_void,
    c_int,
    *mut c_void,
    *mut c_void,
    *const c_char,
) -> *mut c_void;
type BuildGlobalStringFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> *mut c_void;
type VerifyFunctionFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type VerifyModuleFn = unsafe extern "C" fn(*mut c_void, c_int, *mut *mut c_char) -> c_int;
type PrintModuleFn = unsafe extern "C" fn(*mut c_void) -> *mut c_char;
type DisposeMessageFn = unsafe extern "C" fn(*mut c_char);

/// The resolved symbol table of one loaded LLVM shared library
#[derive(Debug)]
pub struct LibLlvm {
    context_create: ContextCreateFn,
    context_dispose: ContextDisposeFn,
    module_create: ModuleCreateFn,
    module_dispose: ModuleDisposeFn,
    builder_create: BuilderCreateFn,
    builder_dispose: BuilderDisposeFn,
    void_type: VoidTypeFn,
    int_type: IntTypeFn,
    pointer_type: PointerTypeFn,
    array_type: ArrayTypeFn,
    function_type: FunctionTypeFn,
    add_function: AddFunctionFn,
    get_param: GetParamFn,
    append_block: AppendBlockFn,
    position_at_end: PositionAtEndFn,
    const_int: ConstIntFn,
    const_null: ConstNullFn,
    get_undef: GetUndefFn,
    build_alloca: BuildAllocaFn,
    build_store: BuildStoreFn,
    build_load: BuildLoadFn,
    build_gep: BuildGepFn,
    build_call: BuildCallFn,
    build_ret: BuildRetFn,
    build_ret_void: BuildRetVoidFn,
    build_br: BuildBrFn,
    build_cond_br: BuildCondBrFn,
    build_icmp: BuildICmpFn,
    build_global_string: BuildGlobalStringFn,
    verify_function: VerifyFunctionFn,
    verify_module: VerifyModuleFn,
    print_module: PrintModuleFn,
    dispose_message: DisposeMessageFn,
    // dropped last; the fn pointers above borrow from it
    _lib: Library,
}

fn sym<T: Copy>(lib: &Library, name: &'static [u8]) -> Result<T, CompilerError> {
    // SAFETY: the signature each call site requests matches the LLVM-C
    // declaration of the named symbol.
    unsafe {
        let symbol: libloading::Symbol<'_, T> = lib.get(name).map_err(|e| {
            CompilerError::LibraryLoad {
                message: format!(
                    "symbol `{}` not found: {e}",
                    String::from_utf8_lossy(&name[..name.len() - 1])
                ),
            }
        })?;
        Ok(*symbol)
    }
}

fn c_name(name: &str) -> Result<CString, CompilerError> {
    CString::new(name).map_err(|_| CompilerError::InternalError {
        message: format!("name `{name}` contains an interior NUL"),
    })
}

impl LibLlvm {
    /// Open the shared library at `path` and resolve every symbol the
    /// backend needs. Any missing symbol fails the whole load.
    pub fn load(path: &str) -> Result<Self, CompilerError> {
        debug!("loading native library from `{path}`");
        // SAFETY: loading a shared object runs its initializers; LLVM's
        // are safe to run in-process.
        let lib = unsafe { Library::new(path) }.map_err(|e| CompilerError::LibraryLoad {
            message: format!("cannot open `{path}`: {e}"),
        })?;

        Ok(Self {
            context_create: sym(&lib, b"LLVMContextCreate\0")?,
            context_dispose: sym(&lib, b"LLVMContextDispose\0")?,
            module_create: sym(&lib, b"LLVMModuleCreateWithNameInContext\0")?,
            module_dispose: sym(&lib, b"LLVMDisposeModule\0")?,
            builder_create: sym(&lib, b"LLVMCreateBuilderInContext\0")?,
            builder_dispose: sym(&lib, b"LLVMDisposeBuilder\0")?,
            void_type: sym(&lib, b"LLVMVoidTypeInContext\0")?,
            int_type: sym(&lib, b"LLVMIntTypeInContext\0")?,
            pointer_type: sym(&lib, b"LLVMPointerType\0")?,
            array_type: sym(&lib, b"LLVMArrayType2\0")?,
            function_type: sym(&lib, b"LLVMFunctionType\0")?,
            add_function: sym(&lib, b"LLVMAddFunction\0")?,
            get_param: sym(&lib, b"LLVMGetParam\0")?,
            append_block: sym(&lib, b"LLVMAppendBasicBlockInContext\0")?,
            position_at_end: sym(&lib, b"LLVMPositionBuilderAtEnd\0")?,
            const_int: sym(&lib, b"LLVMConstInt\0")?,
            const_null: sym(&lib, b"LLVMConstPointerNull\0")?,
            get_undef: sym(&lib, b"LLVMGetUndef\0")?,
            build_alloca: sym(&lib, b"LLVMBuildAlloca\0")?,
            build_store: sym(&lib, b"LLVMBuildStore\0")?,
            build_load: sym(&lib, b"LLVMBuildLoad2\0")?,
            build_gep: sym(&lib, b"LLVMBuildGEP2\0")?,
            build_call: sym(&lib, b"LLVMBuildCall2\0")?,
            build_ret: sym(&lib, b"LLVMBuildRet\0")?,
            build_ret_void: sym(&lib, b"LLVMBuildRetVoid\0")?,
            build_br: sym(&lib, b"LLVMBuildBr\0")?,
            build_cond_br: sym(&lib, b"LLVMBuildCondBr\0")?,
            build_icmp: sym(&lib, b"LLVMBuildICmp\0")?,
            build_global_string: sym(&lib, b"LLVMBuildGlobalStringPtr\0")?,
            verify_function: sym(&lib, b"LLVMVerifyFunction\0")?,
            verify_module: sym(&lib, b"LLVMVerifyModule\0")?,
            print_module: sym(&lib, b"LLVMPrintModuleToString\0")?,
            dispose_message: sym(&lib, b"LLVMDisposeMessage\0")?,
            _lib: lib,
        })
    }

    fn nonnull<K>(&self, raw: *mut c_void, what: &str) -> Result<Handle<K>, CompilerError> {
        Handle::new(raw).ok_or_else(|| CompilerError::InternalError {
            message: format!("native library returned null for {what}"),
        })
    }

    pub fn context_create(&self) -> Result<ContextHandle, CompilerError> {
        self.nonnull(unsafe { (self.context_create)() }, "context")
    }

    pub fn context_dispose(&self, ctx: ContextHandle) {
        unsafe { (self.context_dispose)(ctx.raw()) }
    }

    pub fn module_create(
        &self,
        name: &str,
        ctx: ContextHandle,
    ) -> Result<ModuleHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.module_create)(name.as_ptr(), ctx.raw()) },
            "module",
        )
    }

    pub fn module_dispose(&self, module: ModuleHandle) {
        unsafe { (self.module_dispose)(module.raw()) }
    }

    pub fn builder_create(&self, ctx: ContextHandle) -> Result<BuilderHandle, CompilerError> {
        self.nonnull(unsafe { (self.builder_create)(ctx.raw()) }, "builder")
    }

    pub fn builder_dispose(&self, builder: BuilderHandle) {
        unsafe { (self.builder_dispose)(builder.raw()) }
    }

    pub fn void_type(&self, ctx: ContextHandle) -> Result<TypeHandle, CompilerError> {
        self.nonnull(unsafe { (self.void_type)(ctx.raw()) }, "void type")
    }

    pub fn int_type(&self, ctx: ContextHandle, bits: u32) -> Result<TypeHandle, CompilerError> {
        self.nonnull(unsafe { (self.int_type)(ctx.raw(), bits) }, "int type")
    }

    pub fn pointer_type(&self, pointee: TypeHandle) -> Result<TypeHandle, CompilerError> {
        self.nonnull(unsafe { (self.pointer_type)(pointee.raw(), 0) }, "pointer type")
    }

    pub fn array_type(&self, element: TypeHandle, size: u64) -> Result<TypeHandle, CompilerError> {
        self.nonnull(unsafe { (self.array_type)(element.raw(), size) }, "array type")
    }

    pub fn function_type(
        &self,
        return_type: TypeHandle,
        params: &[TypeHandle],
        is_vararg: bool,
    ) -> Result<TypeHandle, CompilerError> {
        let mut params = marshal(params);
        self.nonnull(
            unsafe {
                (self.function_type)(
                    return_type.raw(),
                    params.as_mut_ptr(),
                    params.len() as c_uint,
                    is_vararg as c_int,
                )
            },
            "function type",
        )
    }

    pub fn add_function(
        &self,
        module: ModuleHandle,
        name: &str,
        fn_type: TypeHandle,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.add_function)(module.raw(), name.as_ptr(), fn_type.raw()) },
            "function",
        )
    }

    pub fn get_param(&self, function: ValueHandle, index: u32) -> Result<ValueHandle, CompilerError> {
        self.nonnull(unsafe { (self.get_param)(function.raw(), index) }, "parameter")
    }

    pub fn append_block(
        &self,
        ctx: ContextHandle,
        function: ValueHandle,
        name: &str,
    ) -> Result<BlockHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.append_block)(ctx.raw(), function.raw(), name.as_ptr()) },
            "basic block",
        )
    }

    pub fn position_at_end(&self, builder: BuilderHandle, block: BlockHandle) {
        unsafe { (self.position_at_end)(builder.raw(), block.raw()) }
    }

    pub fn const_int(
        &self,
        ty: TypeHandle,
        value: u64,
        sign_extend: bool,
    ) -> Result<ValueHandle, CompilerError> {
        self.nonnull(
            unsafe { (self.const_int)(ty.raw(), value, sign_extend as c_int) },
            "integer constant",
        )
    }

    pub fn const_null(&self, ty: TypeHandle) -> Result<ValueHandle, CompilerError> {
        self.nonnull(unsafe { (self.const_null)(ty.raw()) }, "null constant")
    }

    pub fn get_undef(&self, ty: TypeHandle) -> Result<ValueHandle, CompilerError> {
        self.nonnull(unsafe { (self.get_undef)(ty.raw()) }, "undef")
    }

    pub fn build_alloca(
        &self,
        builder: BuilderHandle,
        ty: TypeHandle,
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.build_alloca)(builder.raw(), ty.raw(), name.as_ptr()) },
            "alloca",
        )
    }

    pub fn build_store(
        &self,
        builder: BuilderHandle,
        value: ValueHandle,
        ptr: ValueHandle,
    ) -> Result<ValueHandle, CompilerError> {
        self.nonnull(
            unsafe { (self.build_store)(builder.raw(), value.raw(), ptr.raw()) },
            "store",
        )
    }

    pub fn build_load(
        &self,
        builder: BuilderHandle,
        ty: TypeHandle,
        ptr: ValueHandle,
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.build_load)(builder.raw(), ty.raw(), ptr.raw(), name.as_ptr()) },
            "load",
        )
    }

    pub fn build_gep(
        &self,
        builder: BuilderHandle,
        pointee: TypeHandle,
        base: ValueHandle,
        indices: &[ValueHandle],
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        let mut indices = marshal(indices);
        self.nonnull(
            unsafe {
                (self.build_gep)(
                    builder.raw(),
                    pointee.raw(),
                    base.raw(),
                    indices.as_mut_ptr(),
                    indices.len() as c_uint,
                    name.as_ptr(),
                )
            },
            "getelementptr",
        )
    }

    pub fn build_call(
        &self,
        builder: BuilderHandle,
        fn_type: TypeHandle,
        callee: ValueHandle,
        args: &[ValueHandle],
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        let mut args = marshal(args);
        self.nonnull(
            unsafe {
                (self.build_call)(
                    builder.raw(),
                    fn_type.raw(),
                    callee.raw(),
                    args.as_mut_ptr(),
                    args.len() as c_uint,
                    name.as_ptr(),
                )
            },
            "call",
        )
    }

    pub fn build_ret(
        &self,
        builder: BuilderHandle,
        value: Option<ValueHandle>,
    ) -> Result<ValueHandle, CompilerError> {
        let raw = unsafe {
            match value {
                Some(value) => (self.build_ret)(builder.raw(), value.raw()),
                None => (self.build_ret_void)(builder.raw()),
            }
        };
        self.nonnull(raw, "ret")
    }

    pub fn build_br(
        &self,
        builder: BuilderHandle,
        target: BlockHandle,
    ) -> Result<ValueHandle, CompilerError> {
        self.nonnull(unsafe { (self.build_br)(builder.raw(), target.raw()) }, "br")
    }

    pub fn build_cond_br(
        &self,
        builder: BuilderHandle,
        condition: ValueHandle,
        then_block: BlockHandle,
        else_block: BlockHandle,
    ) -> Result<ValueHandle, CompilerError> {
        self.nonnull(
            unsafe {
                (self.build_cond_br)(
                    builder.raw(),
                    condition.raw(),
                    then_block.raw(),
                    else_block.raw(),
                )
            },
            "condbr",
        )
    }

    /// `icmp ne lhs, rhs` - used to collapse a wide condition to i1
    pub fn build_icmp_ne(
        &self,
        builder: BuilderHandle,
        lhs: ValueHandle,
        rhs: ValueHandle,
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.build_icmp)(builder.raw(), INT_NE, lhs.raw(), rhs.raw(), name.as_ptr()) },
            "icmp",
        )
    }

    pub fn build_global_string(
        &self,
        builder: BuilderHandle,
        content: &str,
        name: &str,
    ) -> Result<ValueHandle, CompilerError> {
        let content = c_name(content)?;
        let name = c_name(name)?;
        self.nonnull(
            unsafe { (self.build_global_string)(builder.raw(), content.as_ptr(), name.as_ptr()) },
            "global string",
        )
    }

    /// Check one function; the native verifier reports pass/fail only,
    /// so the caller supplies the context for the diagnostic.
    pub fn verify_function(&self, function: ValueHandle) -> bool {
        unsafe { (self.verify_function)(function.raw(), RETURN_STATUS_ACTION) == 0 }
    }

    /// Check the whole module. On failure the verifier's own message is
    /// copied into an owned `String` and the native buffer is released.
    pub fn verify_module(&self, module: ModuleHandle) -> Result<(), String> {
        let mut message: *mut c_char = std::ptr::null_mut();
        let broken =
            unsafe { (self.verify_module)(module.raw(), RETURN_STATUS_ACTION, &mut message) } != 0;
        let text = self.take_message(message);
        if broken {
            Err(text.unwrap_or_else(|| "module verification failed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Render the module as textual IR
    pub fn print_module(&self, module: ModuleHandle) -> Result<String, CompilerError> {
        let raw = unsafe { (self.print_module)(module.raw()) };
        self.take_message(raw)
            .ok_or_else(|| CompilerError::InternalError {
                message: "native library returned null for module text".to_string(),
            })
    }

    /// Copy a native-owned message into a `String` and free the native
    /// buffer. Returns `None` for a null message.
    fn take_message(&self, raw: *mut c_char) -> Option<String> {
        if raw.is_null() {
            return None;
        }
        // SAFETY: the native library hands over a NUL-terminated buffer
        // that we own until dispose_message.
        let text = unsafe { std::ffi::CStr::from_ptr(raw) }
            .to_string_lossy()
            .into_owned();
        unsafe { (self.dispose_message)(raw) };
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reports_missing_library() {
        let err = LibLlvm::load("/nonexistent/libLLVM.so").unwrap_err();
        assert!(matches!(err, CompilerError::LibraryLoad { .. }));
    }

    #[test]
    fn test_c_name_rejects_interior_nul() {
        assert!(c_name("bad\0name").is_err());
        assert!(c_name("fine").is_ok());
    }
}
