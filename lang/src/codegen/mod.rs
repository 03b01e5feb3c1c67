mod compiler;
mod context;

#[cfg(test)]
mod tests;

pub use context::CodegenContext;
// Re-exported so the driver does not need its own inkwell dependency.
pub use inkwell::context::Context;
pub use inkwell::OptimizationLevel;

use crate::error::CodegenError;
use crate::parser::ast::Program;

/// Lower a validated program into an LLVM module.
pub fn compile<'ctx>(
    context: &'ctx Context,
    program: &Program,
    opt_level: OptimizationLevel,
) -> Result<CodegenContext<'ctx>, CodegenError> {
    let mut codegen = CodegenContext::with_optimization(context, "ferro", opt_level);
    codegen.compile_program(program)?;
    Ok(codegen)
}
