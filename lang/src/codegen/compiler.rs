use std::collections::HashMap;

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, IntValue, PointerValue,
};
use inkwell::IntPredicate;

use super::context::{CodegenContext, Slot};
use crate::error::CodegenError;
use crate::parser::ast::{
    Assignment, BinaryOp, Block, Expr, ExprKind, ExternFunctionDecl, For, FunctionDecl, If, Param,
    Return, Stmt, Type, UnaryOp, VarDecl, While,
};

/// An expression result that can be consumed either as a read or as a write
/// target. `Place` carries the address and the pointee type; forcing it to a
/// value emits the load.
pub(super) enum Emitted<'ctx> {
    Value(BasicValueEnum<'ctx>),
    Place {
        ptr: PointerValue<'ctx>,
        ty: BasicTypeEnum<'ctx>,
    },
}

impl<'ctx> CodegenContext<'ctx> {
    pub(super) fn compile_program(
        &mut self,
        program: &crate::parser::ast::Program,
    ) -> Result<(), CodegenError> {
        for ext in &program.externs {
            self.declare_extern(ext);
        }
        for decl in &program.globals {
            self.declare_globals(decl);
        }
        for func in &program.functions {
            self.compile_function(func)?;
        }
        self.compile_entrypoint(&program.globals)
    }

    fn function_type(&self, params: &[Param], return_type: Type) -> FunctionType<'ctx> {
        let param_types: Vec<BasicMetadataTypeEnum> =
            params.iter().map(|p| self.llvm_type(p.ty).into()).collect();
        self.llvm_type(return_type).fn_type(&param_types, false)
    }

    /// Extern functions keep their exact source name and C linkage.
    fn declare_extern(&mut self, decl: &ExternFunctionDecl) {
        let fn_type = self.function_type(&decl.params, decl.return_type);
        let value = self
            .module
            .add_function(&decl.name, fn_type, Some(Linkage::External));
        self.functions.insert(decl.name.clone(), value);
    }

    fn declare_globals(&mut self, decl: &VarDecl) {
        for var in &decl.vars {
            let ty = self.llvm_type(var.ty);
            let global = self.module.add_global(ty, None, &var.name);
            global.set_linkage(Linkage::Internal);
            global.set_initializer(&ty.const_zero());
            self.globals.insert(
                var.name.clone(),
                Slot {
                    ptr: global.as_pointer_value(),
                    ty,
                },
            );
        }
    }

    fn compile_function(&mut self, decl: &FunctionDecl) -> Result<(), CodegenError> {
        let fn_type = self.function_type(&decl.params, decl.return_type);
        // User functions are anonymous at the LLVM level; only the synthetic
        // entry point and extern declarations carry link-level names.
        let function = self.module.add_function("", fn_type, None);
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.functions.insert(decl.name.clone(), function);
        self.current_function = Some(function);
        self.enter();
        for (i, param) in decl.params.iter().enumerate() {
            let ty = self.llvm_type(param.ty);
            let ptr = self.builder.build_alloca(ty, &param.name).unwrap();
            let arg = function.get_nth_param(i as u32).unwrap();
            self.builder.build_store(ptr, arg).unwrap();
            self.declare_local(&param.name, Slot { ptr, ty });
        }
        self.compile_block(&decl.body)?;
        self.leave();
        // Return coverage was proven by the analyser, so an unterminated
        // final block cannot be reached at run time.
        if self.current_block_unterminated() {
            self.builder.build_unreachable().unwrap();
        }
        Ok(())
    }

    /// The emitted entry point: named `main`, runs global initialisers in
    /// declaration order, then calls the user's `main` and returns its value.
    fn compile_entrypoint(&mut self, globals: &[VarDecl]) -> Result<(), CodegenError> {
        let user_main = match self.functions.get("main") {
            Some(function) => *function,
            None => return Err(CodegenError::MissingMain),
        };
        let fn_type = self.context.i32_type().fn_type(&[], false);
        let entry = self.module.add_function("main", fn_type, None);
        let block = self.context.append_basic_block(entry, "entry");
        self.builder.position_at_end(block);
        self.current_function = Some(entry);
        for decl in globals {
            for var in &decl.vars {
                if let Some(init) = &var.init {
                    let value = self.compile_expr_value(init)?;
                    let slot = self.globals[var.name.as_str()];
                    self.builder.build_store(slot.ptr, value).unwrap();
                }
            }
        }
        let result = self.builder.build_call(user_main, &[], "user_main").unwrap();
        let result = result
            .try_as_basic_value()
            .left()
            .expect("user main returns int");
        self.builder.build_return(Some(&result)).unwrap();
        Ok(())
    }

    // ---- scopes ----

    fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, slot: Slot<'ctx>) {
        self.scopes
            .last_mut()
            .expect("no active scope")
            .insert(name.to_string(), slot);
    }

    /// Resolution mirrors the analyser: innermost scope first, then globals.
    /// The analyser has proven the name resolves.
    fn find_variable(&self, name: &str) -> Slot<'ctx> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return *slot;
            }
        }
        self.globals[name]
    }

    fn current_block_unterminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .map(|block| block.get_terminator().is_none())
            .unwrap_or(false)
    }

    // ---- statements ----

    fn compile_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        self.enter();
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
            // Statements after a terminator are unreachable; prune them.
            if !self.current_block_unterminated() {
                break;
            }
        }
        self.leave();
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::VarDecl(decl) => self.compile_var_decl(decl),
            Stmt::Assignment(assign) => self.compile_assignment(assign),
            Stmt::Return(ret) => self.compile_return(ret),
            Stmt::Expr(expr) => {
                self.compile_expr_value(expr)?;
                Ok(())
            }
            Stmt::If(stmt) => self.compile_if(stmt),
            Stmt::For(stmt) => self.compile_for(stmt),
            Stmt::While(stmt) => self.compile_while(stmt),
        }
    }

    fn compile_var_decl(&mut self, decl: &VarDecl) -> Result<(), CodegenError> {
        for var in &decl.vars {
            let ty = self.llvm_type(var.ty);
            let ptr = self.builder.build_alloca(ty, &var.name).unwrap();
            self.declare_local(&var.name, Slot { ptr, ty });
            if let Some(init) = &var.init {
                let value = self.compile_expr_value(init)?;
                self.builder.build_store(ptr, value).unwrap();
            }
        }
        Ok(())
    }

    fn compile_assignment(&mut self, assign: &Assignment) -> Result<(), CodegenError> {
        let (targets, value) = assign.parts.split_at(assign.parts.len() - 1);
        let value = self.compile_expr_value(&value[0])?;
        for target in targets {
            let emitted = self.compile_expr(target)?;
            let (ptr, _) = self.require_place(emitted)?;
            self.builder.build_store(ptr, value).unwrap();
        }
        Ok(())
    }

    fn compile_return(&mut self, ret: &Return) -> Result<(), CodegenError> {
        let value = self.compile_expr_value(&ret.value)?;
        self.builder.build_return(Some(&value)).unwrap();
        Ok(())
    }

    fn compile_if(&mut self, stmt: &If) -> Result<(), CodegenError> {
        let function = self.current_function.expect("statement outside a function");
        let after = self.context.append_basic_block(function, "after_if");
        for (condition, block) in &stmt.branches {
            let value = self.compile_expr_value(condition)?;
            let cond = self.to_bool(value);
            let then_block = self.context.append_basic_block(function, "cond_true");
            let else_block = self.context.append_basic_block(function, "cond_false");
            self.builder
                .build_conditional_branch(cond, then_block, else_block)
                .unwrap();
            self.builder.position_at_end(then_block);
            self.compile_block(block)?;
            if self.current_block_unterminated() {
                self.builder.build_unconditional_branch(after).unwrap();
            }
            self.builder.position_at_end(else_block);
        }
        if let Some(block) = &stmt.else_block {
            self.compile_block(block)?;
        }
        if self.current_block_unterminated() {
            self.builder.build_unconditional_branch(after).unwrap();
        }
        self.builder.position_at_end(after);
        Ok(())
    }

    /// `for i in start..end[..step]`: exclusive upper bound, default step 1,
    /// loop variable in its own scope.
    fn compile_for(&mut self, stmt: &For) -> Result<(), CodegenError> {
        let function = self.current_function.expect("statement outside a function");
        let i32_type = self.context.i32_type();
        let start = self.compile_expr_value(&stmt.start)?.into_int_value();
        let end = self.compile_expr_value(&stmt.end)?.into_int_value();
        let step = match &stmt.step {
            Some(step) => self.compile_expr_value(step)?.into_int_value(),
            None => i32_type.const_int(1, false),
        };
        self.enter();
        let slot = self.builder.build_alloca(i32_type, &stmt.var).unwrap();
        self.builder.build_store(slot, start).unwrap();
        self.declare_local(
            &stmt.var,
            Slot {
                ptr: slot,
                ty: i32_type.into(),
            },
        );
        let condition_block = self.context.append_basic_block(function, "loop_condition");
        let body_block = self.context.append_basic_block(function, "loop_body");
        let after_block = self.context.append_basic_block(function, "after_loop");
        self.builder
            .build_unconditional_branch(condition_block)
            .unwrap();
        self.builder.position_at_end(condition_block);
        let current = self
            .builder
            .build_load(i32_type, slot, &stmt.var)
            .unwrap()
            .into_int_value();
        let cond = self
            .builder
            .build_int_compare(IntPredicate::SLT, current, end, "loop_cond")
            .unwrap();
        self.builder
            .build_conditional_branch(cond, body_block, after_block)
            .unwrap();
        self.builder.position_at_end(body_block);
        self.compile_block(&stmt.body)?;
        if self.current_block_unterminated() {
            let current = self
                .builder
                .build_load(i32_type, slot, &stmt.var)
                .unwrap()
                .into_int_value();
            let next = self.builder.build_int_add(current, step, "loop_next").unwrap();
            self.builder.build_store(slot, next).unwrap();
            self.builder
                .build_unconditional_branch(condition_block)
                .unwrap();
        }
        self.builder.position_at_end(after_block);
        self.leave();
        Ok(())
    }

    fn compile_while(&mut self, stmt: &While) -> Result<(), CodegenError> {
        let function = self.current_function.expect("statement outside a function");
        let condition_block = self.context.append_basic_block(function, "loop_condition");
        let body_block = self.context.append_basic_block(function, "loop_body");
        let after_block = self.context.append_basic_block(function, "after_loop");
        self.builder
            .build_unconditional_branch(condition_block)
            .unwrap();
        self.builder.position_at_end(condition_block);
        let value = self.compile_expr_value(&stmt.condition)?;
        let cond = self.to_bool(value);
        self.builder
            .build_conditional_branch(cond, body_block, after_block)
            .unwrap();
        self.builder.position_at_end(body_block);
        self.compile_block(&stmt.body)?;
        if self.current_block_unterminated() {
            self.builder
                .build_unconditional_branch(condition_block)
                .unwrap();
        }
        self.builder.position_at_end(after_block);
        Ok(())
    }

    // ---- expressions ----

    fn force_value(&self, emitted: Emitted<'ctx>) -> BasicValueEnum<'ctx> {
        match emitted {
            Emitted::Value(value) => value,
            Emitted::Place { ptr, ty } => self.builder.build_load(ty, ptr, "load").unwrap(),
        }
    }

    fn require_place(
        &self,
        emitted: Emitted<'ctx>,
    ) -> Result<(PointerValue<'ctx>, BasicTypeEnum<'ctx>), CodegenError> {
        match emitted {
            Emitted::Place { ptr, ty } => Ok((ptr, ty)),
            Emitted::Value(_) => Err(CodegenError::InvalidWriteTarget),
        }
    }

    fn compile_expr_value(&mut self, expr: &Expr) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let emitted = self.compile_expr(expr)?;
        Ok(self.force_value(emitted))
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<Emitted<'ctx>, CodegenError> {
        match &expr.kind {
            ExprKind::IntConst(value) => Ok(Emitted::Value(
                self.context
                    .i32_type()
                    .const_int(*value as u64, true)
                    .into(),
            )),
            ExprKind::StringConst(value) => {
                Ok(Emitted::Value(self.compile_string_const(value).into()))
            }
            ExprKind::Variable(name) => {
                let slot = self.find_variable(name);
                Ok(Emitted::Place {
                    ptr: slot.ptr,
                    ty: slot.ty,
                })
            }
            ExprKind::Unary { op, operand } => self.compile_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.compile_binary(*op, lhs, rhs),
            ExprKind::Index { base, index } => self.compile_index(base, index),
            ExprKind::Call { name, args } => self.compile_call(name, args),
        }
    }

    /// A string constant is a private global array of 32-bit code units with
    /// a terminating zero.
    fn compile_string_const(&mut self, value: &str) -> PointerValue<'ctx> {
        let i32_type = self.context.i32_type();
        let mut units: Vec<IntValue> = value
            .chars()
            .map(|ch| i32_type.const_int(ch as u64, false))
            .collect();
        units.push(i32_type.const_zero());
        let array = i32_type.const_array(&units);
        let global = self.module.add_global(array.get_type(), None, "str");
        global.set_linkage(Linkage::Private);
        global.set_constant(true);
        global.set_initializer(&array);
        global.as_pointer_value()
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Emitted<'ctx>, CodegenError> {
        match op {
            UnaryOp::Minus => {
                let value = self.compile_expr_value(operand)?.into_int_value();
                Ok(Emitted::Value(
                    self.builder.build_int_neg(value, "neg").unwrap().into(),
                ))
            }
            UnaryOp::BitNot | UnaryOp::Not => {
                let value = self.compile_expr_value(operand)?.into_int_value();
                Ok(Emitted::Value(
                    self.builder.build_not(value, "not").unwrap().into(),
                ))
            }
            UnaryOp::AddrOf => {
                let emitted = self.compile_expr(operand)?;
                let (ptr, _) = self.require_place(emitted)?;
                Ok(Emitted::Value(ptr.into()))
            }
            UnaryOp::Deref => {
                let ptr = self.compile_expr_value(operand)?.into_pointer_value();
                Ok(Emitted::Place {
                    ptr,
                    ty: self.context.i32_type().into(),
                })
            }
        }
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Emitted<'ctx>, CodegenError> {
        let lhs = self.compile_expr_value(lhs)?.into_int_value();
        let rhs = self.compile_expr_value(rhs)?.into_int_value();
        let b = &self.builder;
        let value = match op {
            BinaryOp::Add => b.build_int_add(lhs, rhs, "add").unwrap(),
            BinaryOp::Sub => b.build_int_sub(lhs, rhs, "sub").unwrap(),
            BinaryOp::Mul => b.build_int_mul(lhs, rhs, "mul").unwrap(),
            BinaryOp::Div => b.build_int_signed_div(lhs, rhs, "div").unwrap(),
            BinaryOp::Mod => b.build_int_signed_rem(lhs, rhs, "rem").unwrap(),
            BinaryOp::BitAnd | BinaryOp::And => b.build_and(lhs, rhs, "and").unwrap(),
            BinaryOp::BitOr | BinaryOp::Or => b.build_or(lhs, rhs, "or").unwrap(),
            BinaryOp::BitXor => b.build_xor(lhs, rhs, "xor").unwrap(),
            BinaryOp::ShiftLeft => b.build_left_shift(lhs, rhs, "shl").unwrap(),
            // Arithmetic shift: ints are signed.
            BinaryOp::ShiftRight => b.build_right_shift(lhs, rhs, true, "shr").unwrap(),
            BinaryOp::Less => b
                .build_int_compare(IntPredicate::SLT, lhs, rhs, "cmp")
                .unwrap(),
            BinaryOp::Greater => b
                .build_int_compare(IntPredicate::SGT, lhs, rhs, "cmp")
                .unwrap(),
            BinaryOp::LessEqual => b
                .build_int_compare(IntPredicate::SLE, lhs, rhs, "cmp")
                .unwrap(),
            BinaryOp::GreaterEqual => b
                .build_int_compare(IntPredicate::SGE, lhs, rhs, "cmp")
                .unwrap(),
            BinaryOp::Equal => b
                .build_int_compare(IntPredicate::EQ, lhs, rhs, "cmp")
                .unwrap(),
            BinaryOp::NotEqual => b
                .build_int_compare(IntPredicate::NE, lhs, rhs, "cmp")
                .unwrap(),
        };
        Ok(Emitted::Value(value.into()))
    }

    fn compile_index(&mut self, base: &Expr, index: &Expr) -> Result<Emitted<'ctx>, CodegenError> {
        let ptr = self.compile_expr_value(base)?.into_pointer_value();
        let index = self.compile_expr_value(index)?.into_int_value();
        let i32_type = self.context.i32_type();
        let addr = unsafe { self.builder.build_gep(i32_type, ptr, &[index], "index") }.unwrap();
        Ok(Emitted::Place {
            ptr: addr,
            ty: i32_type.into(),
        })
    }

    fn compile_call(&mut self, name: &str, args: &[Expr]) -> Result<Emitted<'ctx>, CodegenError> {
        let function = self.functions[name];
        let mut values: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.compile_expr_value(arg)?.into());
        }
        let call = self.builder.build_call(function, &values, "call").unwrap();
        let value = call
            .try_as_basic_value()
            .left()
            .expect("functions always return a value");
        Ok(Emitted::Value(value))
    }

    /// `if`/`while` conditions: already-boolean `i1` values pass through,
    /// ints are tested against zero.
    fn to_bool(&self, value: BasicValueEnum<'ctx>) -> IntValue<'ctx> {
        let value = value.into_int_value();
        if value.get_type().get_bit_width() == 1 {
            value
        } else {
            self.builder
                .build_int_compare(
                    IntPredicate::NE,
                    value,
                    self.context.i32_type().const_zero(),
                    "tobool",
                )
                .unwrap()
        }
    }
}
