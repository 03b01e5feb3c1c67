//! Fully-parenthesised expression printing, used to pin the parser's shape
//! in tests: `a+b*c` renders as `((a)+((b)*(c)))`.

use super::ast::{BinaryOp, Expr, ExprKind, UnaryOp};

pub fn parenthesize(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntConst(value) => format!("({})", value),
        ExprKind::StringConst(value) => format!("({:?})", value),
        ExprKind::Variable(name) => format!("({})", name),
        ExprKind::Unary { op, operand } => {
            format!("({}{})", unary_symbol(*op), parenthesize(operand))
        }
        ExprKind::Binary { op, lhs, rhs } => format!(
            "({}{}{})",
            parenthesize(lhs),
            binary_symbol(*op),
            parenthesize(rhs)
        ),
        ExprKind::Index { base, index } => {
            format!("({}[{}])", parenthesize(base), parenthesize(index))
        }
        ExprKind::Call { name, args } => {
            let args: Vec<String> = args.iter().map(parenthesize).collect();
            format!("({}({}))", name, args.join(","))
        }
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Minus => "-",
        UnaryOp::BitNot => "~",
        UnaryOp::AddrOf => "&",
        UnaryOp::Deref => "*",
        UnaryOp::Not => "!",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitXor => "^",
        BinaryOp::BitOr => "|",
        BinaryOp::ShiftLeft => "<<",
        BinaryOp::ShiftRight => ">>",
        BinaryOp::Less => "<",
        BinaryOp::Greater => ">",
        BinaryOp::LessEqual => "<=",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}
