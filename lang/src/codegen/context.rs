use std::collections::HashMap;
use std::path::Path;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};
use inkwell::{AddressSpace, OptimizationLevel};

use crate::error::CodegenError;
use crate::parser::ast::Type;

/// A variable's stack or global slot: its address and the LLVM type stored
/// there (needed to type loads under opaque pointers).
#[derive(Clone, Copy)]
pub(super) struct Slot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
}

/// Owns the LLVM module being built and the mutable lowering state. The LLVM
/// `Context` is passed in by the caller; there is no process-wide singleton.
pub struct CodegenContext<'ctx> {
    pub(super) context: &'ctx Context,
    pub(super) module: Module<'ctx>,
    pub(super) builder: Builder<'ctx>,
    pub(super) scopes: Vec<HashMap<String, Slot<'ctx>>>,
    pub(super) globals: HashMap<String, Slot<'ctx>>,
    pub(super) functions: HashMap<String, FunctionValue<'ctx>>,
    pub(super) current_function: Option<FunctionValue<'ctx>>,
    opt_level: OptimizationLevel,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        Self::with_optimization(context, module_name, OptimizationLevel::Default)
    }

    pub fn with_optimization(
        context: &'ctx Context,
        module_name: &str,
        opt_level: OptimizationLevel,
    ) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        Self {
            context,
            module,
            builder,
            scopes: Vec::new(),
            globals: HashMap::new(),
            functions: HashMap::new(),
            current_function: None,
            opt_level,
        }
    }

    pub(super) fn llvm_type(&self, ty: Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Int => self.context.i32_type().into(),
            // Strings are pointers to 32-bit code-unit arrays; both pointer
            // types erase to the opaque pointer.
            Type::String | Type::IntPointer => {
                self.context.ptr_type(AddressSpace::default()).into()
            }
        }
    }

    /// The LLVM IR as text.
    pub fn ir_text(&self) -> String {
        self.module.print_to_string().to_string()
    }

    pub fn verify(&self) -> Result<(), CodegenError> {
        self.module
            .verify()
            .map_err(|e| CodegenError::Llvm(e.to_string()))
    }

    pub fn save_ir(&self, path: &Path) -> Result<(), CodegenError> {
        self.module
            .print_to_file(path)
            .map_err(|e| CodegenError::Llvm(e.to_string()))
    }

    pub fn save_bitcode(&self, path: &Path) -> Result<(), CodegenError> {
        if self.module.write_bitcode_to_path(path) {
            Ok(())
        } else {
            Err(CodegenError::Llvm(format!(
                "failed to write bitcode to {}",
                path.display()
            )))
        }
    }

    /// Run the standard `default<On>` pass pipeline for the configured
    /// level. A no-op at `-O0`.
    pub fn optimize(&self) -> Result<(), CodegenError> {
        if self.opt_level == OptimizationLevel::None {
            return Ok(());
        }
        Target::initialize_native(&InitializationConfig::default()).map_err(CodegenError::Llvm)?;
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| CodegenError::Llvm(e.to_string()))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                self.opt_level,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| CodegenError::Llvm("failed to create target machine".to_string()))?;
        let passes = match self.opt_level {
            OptimizationLevel::None => "default<O0>",
            OptimizationLevel::Less => "default<O1>",
            OptimizationLevel::Default => "default<O2>",
            OptimizationLevel::Aggressive => "default<O3>",
        };
        self.module
            .run_passes(passes, &machine, PassBuilderOptions::create())
            .map_err(|e| CodegenError::Llvm(e.to_string()))
    }

    /// JIT-compile and run the program in-process. The result is the value
    /// returned by the user's `main`.
    pub fn execute(&self) -> Result<i32, CodegenError> {
        let engine = self
            .module
            .create_jit_execution_engine(self.opt_level)
            .map_err(|e| CodegenError::Llvm(e.to_string()))?;
        let entry = unsafe { engine.get_function::<unsafe extern "C" fn() -> i32>("main") }
            .map_err(|e| CodegenError::Llvm(e.to_string()))?;
        Ok(unsafe { entry.call() })
    }
}
