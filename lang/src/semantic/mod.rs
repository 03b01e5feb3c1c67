//! Semantic analysis: identifier resolution, the value/place type
//! discipline and return-path coverage.
//!
//! Expression visits return an [`ExprType`]; statement visits return a
//! boolean meaning "every path through this statement returns". The program
//! either passes as a whole or the first violation is reported.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::error::SemanticError;
use crate::parser::ast::{
    Assignment, BinaryOp, Block, Expr, ExprKind, ExternFunctionDecl, For, FunctionDecl, If, Param,
    Program, Return, Stmt, Type, UnaryOp, VarDecl, While,
};
use crate::source::Position;

/// The analyser's view of an expression. Each surface type splits into a
/// value flavour and a place flavour (storage that can be written or have
/// its address taken); `Bool` is the temporary produced by comparison and
/// logic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Value(Type),
    Place(Type),
    Bool,
}

impl ExprType {
    /// Usable wherever an integer operand is required.
    fn is_int(self) -> bool {
        matches!(self, ExprType::Value(Type::Int) | ExprType::Place(Type::Int))
    }

    /// Dereferencable and indexable: a pointer value, or a pointer or string
    /// place.
    fn is_indexable(self) -> bool {
        matches!(
            self,
            ExprType::Value(Type::IntPointer)
                | ExprType::Place(Type::IntPointer)
                | ExprType::Place(Type::String)
        )
    }

    fn describe(self) -> &'static str {
        match self {
            ExprType::Value(Type::Int) => "an int value",
            ExprType::Value(Type::String) => "a string value",
            ExprType::Value(Type::IntPointer) => "an int pointer value",
            ExprType::Place(Type::Int) => "an int variable",
            ExprType::Place(Type::String) => "a string variable",
            ExprType::Place(Type::IntPointer) => "an int pointer variable",
            ExprType::Bool => "a boolean value",
        }
    }
}

struct FunctionSig {
    params: Vec<Type>,
    return_type: Type,
}

const RESERVED: [&str; 2] = ["int", "string"];

/// Validate a parsed program.
pub fn analyze(program: &Program) -> Result<(), SemanticError> {
    Analyzer::new().check_program(program)
}

pub struct Analyzer {
    scopes: Vec<HashMap<String, Type>>,
    functions: HashMap<String, FunctionSig>,
    return_type: Type,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            scopes: Vec::new(),
            functions: HashMap::new(),
            return_type: Type::Int,
        }
    }

    fn check_program(&mut self, program: &Program) -> Result<(), SemanticError> {
        self.enter();
        for ext in &program.externs {
            self.declare_extern(ext)?;
        }
        for decl in &program.globals {
            self.check_var_decl(decl)?;
        }
        for func in &program.functions {
            self.check_function(func)?;
        }
        self.leave();
        Ok(())
    }

    // ---- scopes and symbol tables ----

    fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn declare(&mut self, name: &str, ty: Type, position: Position) -> Result<(), SemanticError> {
        self.check_identifier(name, position)?;
        let scope = self.scopes.last_mut().expect("no active scope");
        if scope.contains_key(name) {
            return Err(SemanticError::VariableRedeclaration {
                name: name.to_string(),
                position,
            });
        }
        scope.insert(name.to_string(), ty);
        Ok(())
    }

    fn check_identifier(&self, name: &str, position: Position) -> Result<(), SemanticError> {
        if RESERVED.contains(&name) {
            return Err(SemanticError::ReservedWord {
                name: name.to_string(),
                position,
            });
        }
        Ok(())
    }

    fn param_scope(&self, params: &[Param]) -> Result<HashMap<String, Type>, SemanticError> {
        let mut scope = HashMap::new();
        for param in params {
            self.check_identifier(&param.name, param.position)?;
            if scope.insert(param.name.clone(), param.ty).is_some() {
                return Err(SemanticError::ParameterRedeclaration {
                    name: param.name.clone(),
                    position: param.position,
                });
            }
        }
        Ok(scope)
    }

    fn declare_extern(&mut self, func: &ExternFunctionDecl) -> Result<(), SemanticError> {
        self.check_identifier(&func.name, func.position)?;
        if self.functions.contains_key(&func.name) {
            return Err(SemanticError::FunctionRedeclaration {
                name: func.name.clone(),
                position: func.position,
            });
        }
        self.param_scope(&func.params)?;
        self.functions.insert(
            func.name.clone(),
            FunctionSig {
                params: func.params.iter().map(|p| p.ty).collect(),
                return_type: func.return_type,
            },
        );
        Ok(())
    }

    fn check_function(&mut self, func: &FunctionDecl) -> Result<(), SemanticError> {
        self.check_identifier(&func.name, func.position)?;
        self.check_main(func)?;
        if self.functions.contains_key(&func.name) {
            return Err(SemanticError::FunctionRedeclaration {
                name: func.name.clone(),
                position: func.position,
            });
        }
        let params = self.param_scope(&func.params)?;
        // Registered before the body is visited so direct recursion resolves.
        self.functions.insert(
            func.name.clone(),
            FunctionSig {
                params: func.params.iter().map(|p| p.ty).collect(),
                return_type: func.return_type,
            },
        );
        self.return_type = func.return_type;
        self.scopes.push(params);
        let returns = self.check_block(&func.body)?;
        self.leave();
        if !returns {
            return Err(SemanticError::MissingReturn {
                function: func.name.clone(),
                position: func.position,
            });
        }
        Ok(())
    }

    fn check_main(&self, func: &FunctionDecl) -> Result<(), SemanticError> {
        if func.name != "main" {
            return Ok(());
        }
        if let Some(param) = func.params.first() {
            return Err(SemanticError::MainTakesParameters {
                position: param.position,
            });
        }
        if func.return_type != Type::Int {
            return Err(SemanticError::MainMustReturnInt {
                position: func.position,
            });
        }
        Ok(())
    }

    // ---- statements; each returns "does every path through me return?" ----

    fn check_block(&mut self, block: &Block) -> Result<bool, SemanticError> {
        self.enter();
        let mut returns = false;
        // A return anywhere in the block covers it; what follows is dead and
        // the code generator prunes it.
        for stmt in &block.statements {
            returns |= self.check_stmt(stmt)?;
        }
        self.leave();
        Ok(returns)
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<bool, SemanticError> {
        match stmt {
            Stmt::VarDecl(decl) => {
                self.check_var_decl(decl)?;
                Ok(false)
            }
            Stmt::Assignment(assign) => {
                self.check_assignment(assign)?;
                Ok(false)
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr)?;
                Ok(false)
            }
            Stmt::Return(ret) => {
                self.check_return(ret)?;
                Ok(true)
            }
            Stmt::If(stmt) => self.check_if(stmt),
            // A loop may run zero times, so it never guarantees a return.
            Stmt::For(stmt) => {
                self.check_for(stmt)?;
                Ok(false)
            }
            Stmt::While(stmt) => {
                self.check_while(stmt)?;
                Ok(false)
            }
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) -> Result<(), SemanticError> {
        for var in &decl.vars {
            self.declare(&var.name, var.ty, var.position)?;
            if let Some(init) = &var.init {
                self.check_assignable(var.ty, init)?;
            }
        }
        Ok(())
    }

    fn check_assignment(&mut self, assign: &Assignment) -> Result<(), SemanticError> {
        let (targets, value) = assign.parts.split_at(assign.parts.len() - 1);
        let source = self.check_expr(&value[0])?;
        let ty = match source {
            ExprType::Value(ty) | ExprType::Place(ty) => ty,
            ExprType::Bool => {
                return Err(SemanticError::TypeMismatch {
                    expected: "an assignable value".to_string(),
                    found: source.describe().to_string(),
                    position: value[0].position,
                })
            }
        };
        for target in targets {
            let target_type = self.check_expr(target)?;
            if target_type != ExprType::Place(ty) {
                return Err(SemanticError::TypeMismatch {
                    expected: ExprType::Place(ty).describe().to_string(),
                    found: target_type.describe().to_string(),
                    position: target.position,
                });
            }
        }
        Ok(())
    }

    fn check_return(&mut self, ret: &Return) -> Result<(), SemanticError> {
        self.check_assignable(self.return_type, &ret.value)
    }

    fn check_if(&mut self, stmt: &If) -> Result<bool, SemanticError> {
        let mut all_return = true;
        for (condition, block) in &stmt.branches {
            self.check_condition(condition)?;
            let branch_returns = self.check_block(block)?;
            all_return &= branch_returns;
        }
        match &stmt.else_block {
            Some(block) => {
                let else_returns = self.check_block(block)?;
                Ok(all_return && else_returns)
            }
            None => Ok(false),
        }
    }

    fn check_for(&mut self, stmt: &For) -> Result<(), SemanticError> {
        self.enter();
        self.check_int_operand(&stmt.start)?;
        self.check_int_operand(&stmt.end)?;
        if let Some(step) = &stmt.step {
            self.check_int_operand(step)?;
        }
        // The loop variable is not visible in the range bounds.
        self.declare(&stmt.var, Type::Int, stmt.var_position)?;
        self.check_block(&stmt.body)?;
        self.leave();
        Ok(())
    }

    fn check_while(&mut self, stmt: &While) -> Result<(), SemanticError> {
        self.check_condition(&stmt.condition)?;
        self.check_block(&stmt.body)?;
        Ok(())
    }

    // ---- expressions ----

    fn check_expr(&mut self, expr: &Expr) -> Result<ExprType, SemanticError> {
        match &expr.kind {
            ExprKind::IntConst(_) => Ok(ExprType::Value(Type::Int)),
            ExprKind::StringConst(_) => Ok(ExprType::Value(Type::String)),
            ExprKind::Variable(name) => {
                self.check_identifier(name, expr.position)?;
                match self.lookup(name) {
                    Some(ty) => Ok(ExprType::Place(ty)),
                    None => Err(SemanticError::UndefinedVariable {
                        name: name.clone(),
                        position: expr.position,
                    }),
                }
            }
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs),
            ExprKind::Index { base, index } => self.check_index(base, index),
            ExprKind::Call { name, args } => self.check_call(name, args, expr.position),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<ExprType, SemanticError> {
        let found = self.check_expr(operand)?;
        match op {
            UnaryOp::Minus | UnaryOp::BitNot => {
                require_int(found, operand)?;
                Ok(ExprType::Value(Type::Int))
            }
            UnaryOp::AddrOf => {
                if found == ExprType::Place(Type::Int) {
                    Ok(ExprType::Value(Type::IntPointer))
                } else {
                    Err(mismatch("an int variable", found, operand))
                }
            }
            UnaryOp::Deref => {
                if found.is_indexable() {
                    Ok(ExprType::Place(Type::Int))
                } else {
                    Err(mismatch("a pointer or string", found, operand))
                }
            }
            UnaryOp::Not => {
                if found == ExprType::Bool {
                    Ok(ExprType::Bool)
                } else {
                    Err(mismatch("a boolean operand", found, operand))
                }
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<ExprType, SemanticError> {
        let left = self.check_expr(lhs)?;
        let right = self.check_expr(rhs)?;
        match op {
            BinaryOp::And | BinaryOp::Or => {
                require_bool(left, lhs)?;
                require_bool(right, rhs)?;
                Ok(ExprType::Bool)
            }
            BinaryOp::Less
            | BinaryOp::Greater
            | BinaryOp::LessEqual
            | BinaryOp::GreaterEqual
            | BinaryOp::Equal
            | BinaryOp::NotEqual => {
                require_int(left, lhs)?;
                require_int(right, rhs)?;
                Ok(ExprType::Bool)
            }
            _ => {
                require_int(left, lhs)?;
                require_int(right, rhs)?;
                Ok(ExprType::Value(Type::Int))
            }
        }
    }

    fn check_index(&mut self, base: &Expr, index: &Expr) -> Result<ExprType, SemanticError> {
        let base_type = self.check_expr(base)?;
        if !base_type.is_indexable() {
            return Err(mismatch("a pointer or string", base_type, base));
        }
        let index_type = self.check_expr(index)?;
        require_int(index_type, index)?;
        Ok(ExprType::Place(Type::Int))
    }

    fn check_call(
        &mut self,
        name: &str,
        args: &[Expr],
        position: Position,
    ) -> Result<ExprType, SemanticError> {
        self.check_identifier(name, position)?;
        let (params, return_type) = match self.functions.get(name) {
            Some(sig) => (sig.params.clone(), sig.return_type),
            None => {
                return Err(SemanticError::UndefinedFunction {
                    name: name.to_string(),
                    position,
                })
            }
        };
        if params.len() != args.len() {
            return Err(SemanticError::ArgumentCountMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                position,
            });
        }
        for (param_type, arg) in params.iter().zip(args) {
            self.check_assignable(*param_type, arg)?;
        }
        Ok(ExprType::Value(return_type))
    }

    // ---- shared checks ----

    /// Assignment compatibility: a target of type T accepts the value or
    /// place flavour of T, nothing else.
    fn check_assignable(&mut self, target: Type, expr: &Expr) -> Result<(), SemanticError> {
        let found = self.check_expr(expr)?;
        let ok = match target {
            Type::Int => found.is_int(),
            Type::IntPointer => matches!(
                found,
                ExprType::Value(Type::IntPointer) | ExprType::Place(Type::IntPointer)
            ),
            Type::String => matches!(
                found,
                ExprType::Value(Type::String) | ExprType::Place(Type::String)
            ),
        };
        if ok {
            Ok(())
        } else {
            Err(mismatch(
                ExprType::Value(target).describe(),
                found,
                expr,
            ))
        }
    }

    /// `if` and `while` conditions accept booleans or ints; ints are tested
    /// against zero at lowering time. `&&`, `||` and `!` stay boolean-only.
    fn check_condition(&mut self, expr: &Expr) -> Result<(), SemanticError> {
        let found = self.check_expr(expr)?;
        if found == ExprType::Bool || found.is_int() {
            Ok(())
        } else {
            Err(mismatch("a boolean or int condition", found, expr))
        }
    }

    fn check_int_operand(&mut self, expr: &Expr) -> Result<(), SemanticError> {
        let found = self.check_expr(expr)?;
        require_int(found, expr)
    }
}

fn mismatch(expected: &str, found: ExprType, expr: &Expr) -> SemanticError {
    SemanticError::TypeMismatch {
        expected: expected.to_string(),
        found: found.describe().to_string(),
        position: expr.position,
    }
}

fn require_int(found: ExprType, expr: &Expr) -> Result<(), SemanticError> {
    if found.is_int() {
        Ok(())
    } else {
        Err(mismatch("an int operand", found, expr))
    }
}

fn require_bool(found: ExprType, expr: &Expr) -> Result<(), SemanticError> {
    if found == ExprType::Bool {
        Ok(())
    } else {
        Err(mismatch("a boolean operand", found, expr))
    }
}
