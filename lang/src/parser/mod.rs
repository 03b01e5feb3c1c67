pub mod ast;
pub mod print;


use crate::error::{CompileError, ParseError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::source::{Position, Source};
use ast::*;

type PResult<T> = Result<T, CompileError>;

/// Parse a whole program from a source.
pub fn parse(source: &mut Source) -> PResult<Program> {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer)?;
    parser.parse_program()
}

/// Single-token-lookahead recursive-descent parser. One routine per
/// precedence level; each level folds its operators into left-associative
/// chains and delegates tighter-binding operands to the next level.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    token: Token,
}

impl<'src> Parser<'src> {
    pub fn new(mut lexer: Lexer<'src>) -> PResult<Self> {
        let token = lexer.next()?;
        Ok(Self { lexer, token })
    }

    fn advance(&mut self) -> PResult<()> {
        self.token = self.lexer.next()?;
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        ParseError {
            message: format!("expected {}, found {}", expected, self.token.kind),
            position: self.token.position,
        }
        .into()
    }

    /// Expect a payload-free token kind and consume it.
    fn eat(&mut self, kind: TokenKind, expected: &str) -> PResult<()> {
        if self.token.kind == kind {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> PResult<(String, Position)> {
        match &self.token.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let position = self.token.position;
                self.advance()?;
                Ok((name, position))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut program = Program::default();
        loop {
            match self.token.kind {
                TokenKind::Eof => break,
                TokenKind::Fn => program.functions.push(self.parse_function_decl()?),
                TokenKind::Let => program.globals.push(self.parse_var_decl()?),
                TokenKind::Extern => program.externs.push(self.parse_extern_decl()?),
                _ => {
                    return Err(self.unexpected(
                        "a function definition, variable declaration or `extern` declaration",
                    ))
                }
            }
        }
        Ok(program)
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        let position = self.token.position;
        self.advance()?; // `fn`
        let (name, _) = self.expect_identifier("a function name")?;
        self.eat(TokenKind::LeftParen, "`(`")?;
        let params = self.parse_param_list()?;
        self.eat(TokenKind::RightParen, "`)` after the parameter list")?;
        self.eat(TokenKind::Arrow, "`->` before the return type")?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body,
            position,
        })
    }

    fn parse_extern_decl(&mut self) -> PResult<ExternFunctionDecl> {
        let position = self.token.position;
        self.advance()?; // `extern`
        self.eat(TokenKind::Fn, "`fn` after `extern`")?;
        let (name, _) = self.expect_identifier("a function name")?;
        self.eat(TokenKind::LeftParen, "`(`")?;
        let params = self.parse_param_list()?;
        self.eat(TokenKind::RightParen, "`)` after the parameter list")?;
        self.eat(TokenKind::Arrow, "`->` before the return type")?;
        let return_type = self.parse_type()?;
        self.eat(TokenKind::Semicolon, "`;` after the extern declaration")?;
        Ok(ExternFunctionDecl {
            name,
            return_type,
            params,
            position,
        })
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if !matches!(self.token.kind, TokenKind::Identifier(_)) {
            return Ok(params);
        }
        loop {
            let (name, position) = self.expect_identifier("a parameter name")?;
            self.eat(TokenKind::Colon, "`:` before the parameter type")?;
            let ty = self.parse_type()?;
            params.push(Param { name, ty, position });
            if self.token.kind != TokenKind::Comma {
                break;
            }
            self.advance()?;
        }
        Ok(params)
    }

    /// `int`, `int*` or `string`. The type names are ordinary identifiers at
    /// the token level; they only become reserved in the analyser.
    fn parse_type(&mut self) -> PResult<Type> {
        let position = self.token.position;
        let name = match &self.token.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return Err(self.unexpected("a type name")),
        };
        self.advance()?;
        match name.as_str() {
            "int" => {
                if self.token.kind == TokenKind::Star {
                    self.advance()?;
                    Ok(Type::IntPointer)
                } else {
                    Ok(Type::Int)
                }
            }
            "string" => Ok(Type::String),
            _ => Err(ParseError {
                message: format!("invalid type `{}`", name),
                position,
            }
            .into()),
        }
    }

    fn parse_var_decl(&mut self) -> PResult<VarDecl> {
        self.advance()?; // `let`
        let mut inits = vec![self.parse_var_init()?];
        while self.token.kind == TokenKind::Comma {
            self.advance()?;
            inits.push(self.parse_var_init()?);
        }
        self.eat(TokenKind::Colon, "`:` before the variable type")?;
        let ty = self.parse_type()?;
        self.eat(TokenKind::Semicolon, "`;` after the declaration")?;
        let vars = inits
            .into_iter()
            .map(|(name, position, init)| VarInit {
                name,
                ty,
                init,
                position,
            })
            .collect();
        Ok(VarDecl { vars })
    }

    fn parse_var_init(&mut self) -> PResult<(String, Position, Option<Expr>)> {
        let (name, position) = self.expect_identifier("a variable name")?;
        let init = if self.token.kind == TokenKind::Assign {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok((name, position, init))
    }

    /// Returns `None` when the current token cannot begin a statement; the
    /// caller decides whether that ends a block or is an error.
    fn parse_statement(&mut self) -> PResult<Option<Stmt>> {
        match self.token.kind {
            TokenKind::For => Ok(Some(Stmt::For(self.parse_for()?))),
            TokenKind::While => Ok(Some(Stmt::While(self.parse_while()?))),
            TokenKind::If => Ok(Some(Stmt::If(self.parse_if()?))),
            TokenKind::Return => Ok(Some(Stmt::Return(self.parse_return()?))),
            TokenKind::Let => Ok(Some(Stmt::VarDecl(self.parse_var_decl()?))),
            _ if self.starts_expression() => Ok(Some(self.parse_assign_or_expr()?)),
            _ => Ok(None),
        }
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.token.kind,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Str(_)
                | TokenKind::LeftParen
                | TokenKind::Bang
        ) || self.token.kind.is_unary()
    }

    fn parse_block(&mut self) -> PResult<Block> {
        self.eat(TokenKind::LeftBrace, "`{` to begin a block")?;
        let mut statements = Vec::new();
        while let Some(stmt) = self.parse_statement()? {
            statements.push(stmt);
        }
        self.eat(TokenKind::RightBrace, "`}` to close the block")?;
        Ok(Block { statements })
    }

    fn parse_if(&mut self) -> PResult<If> {
        self.advance()?; // `if`
        let mut branches = vec![(self.parse_expression()?, self.parse_block()?)];
        while self.token.kind == TokenKind::Elif {
            self.advance()?;
            branches.push((self.parse_expression()?, self.parse_block()?));
        }
        let else_block = if self.token.kind == TokenKind::Else {
            self.advance()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(If {
            branches,
            else_block,
        })
    }

    fn parse_for(&mut self) -> PResult<For> {
        self.advance()?; // `for`
        let (var, var_position) = self.expect_identifier("a loop variable name")?;
        self.eat(TokenKind::In, "`in` after the loop variable")?;
        let start = self.parse_expression()?;
        self.eat(TokenKind::DotDot, "`..` between the range bounds")?;
        let end = self.parse_expression()?;
        let step = if self.token.kind == TokenKind::DotDot {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(For {
            var,
            var_position,
            start,
            end,
            step,
            body,
        })
    }

    fn parse_while(&mut self) -> PResult<While> {
        self.advance()?; // `while`
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(While { condition, body })
    }

    fn parse_return(&mut self) -> PResult<Return> {
        self.advance()?; // `return`
        let value = self.parse_expression()?;
        self.eat(TokenKind::Semicolon, "`;` after the return value")?;
        Ok(Return { value })
    }

    /// Either an expression statement or an n-ary assignment: after the first
    /// expression, `;` closes an expression statement while `=` opens a chain
    /// of further `=`-separated expressions. Whether the left-hand parts
    /// denote storage locations is the analyser's concern.
    fn parse_assign_or_expr(&mut self) -> PResult<Stmt> {
        let first = self.parse_expression()?;
        if self.token.kind != TokenKind::Assign {
            self.eat(TokenKind::Semicolon, "`;` after the expression")?;
            return Ok(Stmt::Expr(first));
        }
        let mut parts = vec![first];
        while self.token.kind == TokenKind::Assign {
            self.advance()?;
            parts.push(self.parse_expression()?);
        }
        self.eat(TokenKind::Semicolon, "`;` after the assignment")?;
        Ok(Stmt::Assignment(Assignment { parts }))
    }

    /// Entry point: the conditional (`&&`/`||`) level.
    pub fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary_logical()?;
        while self.token.kind.is_boolean_binary() {
            let op = self.binary_op()?;
            self.advance()?;
            let rhs = self.parse_unary_logical()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Prefix `!` binds looser than comparisons: `!a == b` negates the whole
    /// comparison.
    fn parse_unary_logical(&mut self) -> PResult<Expr> {
        if self.token.kind == TokenKind::Bang {
            let position = self.token.position;
            self.advance()?;
            let operand = self.parse_logical()?;
            return Ok(Expr {
                position,
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_logical()
    }

    fn parse_logical(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_arithmetical()?;
        while self.token.kind.is_compare() {
            let op = self.binary_op()?;
            self.advance()?;
            let rhs = self.parse_arithmetical()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_arithmetical(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        while self.token.kind.is_bitwise() {
            let op = self.binary_op()?;
            self.advance()?;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        while self.token.kind.is_additive() {
            let op = self.binary_op()?;
            self.advance()?;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.token.kind.is_multiplicative() {
            let op = self.binary_op()?;
            self.advance()?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Stacked prefixes apply outside-in by right-fold recursion; a postfix
    /// index binds tighter than any prefix, so `*b[1]` reads `*(b[1])`.
    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.token.kind.is_unary() {
            let position = self.token.position;
            let op = match UnaryOp::from_token(&self.token.kind) {
                Some(op) => op,
                None => return Err(self.unexpected("a unary operator")),
            };
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Expr {
                position,
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }
        let mut node = self.parse_factor()?;
        if self.token.kind == TokenKind::LeftBracket {
            node = self.parse_index(node)?;
        }
        Ok(node)
    }

    fn parse_index(&mut self, base: Expr) -> PResult<Expr> {
        let position = base.position;
        self.advance()?; // `[`
        let index = self.parse_expression()?;
        self.eat(TokenKind::RightBracket, "`]` after the index")?;
        Ok(Expr {
            position,
            kind: ExprKind::Index {
                base: Box::new(base),
                index: Box::new(index),
            },
        })
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let position = self.token.position;
        match self.token.kind.clone() {
            TokenKind::Integer(value) => {
                self.advance()?;
                Ok(Expr {
                    position,
                    kind: ExprKind::IntConst(value),
                })
            }
            TokenKind::Str(value) => {
                self.advance()?;
                Ok(Expr {
                    position,
                    kind: ExprKind::StringConst(value),
                })
            }
            TokenKind::Identifier(name) => {
                self.advance()?;
                if self.token.kind == TokenKind::LeftParen {
                    self.parse_call(name, position)
                } else {
                    Ok(Expr {
                        position,
                        kind: ExprKind::Variable(name),
                    })
                }
            }
            TokenKind::LeftParen => {
                self.advance()?;
                let node = self.parse_expression()?;
                self.eat(
                    TokenKind::RightParen,
                    "`)` to close the parenthesised expression",
                )?;
                Ok(node)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_call(&mut self, name: String, position: Position) -> PResult<Expr> {
        self.advance()?; // `(`
        let mut args = Vec::new();
        if self.token.kind != TokenKind::RightParen {
            args.push(self.parse_expression()?);
            while self.token.kind == TokenKind::Comma {
                self.advance()?;
                args.push(self.parse_expression()?);
            }
        }
        self.eat(TokenKind::RightParen, "`)` after the call arguments")?;
        Ok(Expr {
            position,
            kind: ExprKind::Call { name, args },
        })
    }

    fn binary_op(&self) -> PResult<BinaryOp> {
        match BinaryOp::from_token(&self.token.kind) {
            Some(op) => Ok(op),
            None => Err(self.unexpected("a binary operator")),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        position: lhs.position,
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}
