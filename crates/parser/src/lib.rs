//! Hand-rolled recursive-descent SQL parser with Pratt-precedence expression
//! parsing, grounded directly in the teaching system's own tokenizer/parser
//! rather than wrapping a general-purpose SQL dialect.

mod ast;
mod tokenizer;

pub use ast::*;
pub use tokenizer::{render_tokens, tokenize, Keyword, Spanned, Token};

use common::{DbError, DbResult};
use expr::{BinaryOp, UnaryOp};
use types::{SqlType, Value};

/// Tokenize and parse exactly one statement, terminated by `;`.
pub fn parse_statement(sql: &str) -> DbResult<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.parse_statement()?;
    parser.expect(Token::Semicolon)?;
    Ok(stmt)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.position)
            .unwrap_or_else(|| self.tokens.last().map(|s| s.position + 1).unwrap_or(0))
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|s| s.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> DbResult<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(DbError::SyntaxError {
                message: format!("expected '{expected}', found '{tok}'"),
                position: self.position(),
            }),
            None => Err(DbError::SyntaxError {
                message: format!("expected '{expected}', found end of input"),
                position: self.position(),
            }),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> DbResult<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current(), Some(Token::Keyword(k)) if *k == keyword)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> DbResult<String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(tok) => Err(DbError::SyntaxError {
                message: format!("expected identifier, found '{tok}'"),
                position: self.position(),
            }),
            None => Err(DbError::SyntaxError {
                message: "expected identifier, found end of input".into(),
                position: self.position(),
            }),
        }
    }

    fn parse_statement(&mut self) -> DbResult<Statement> {
        match self.current() {
            Some(Token::Keyword(Keyword::Begin)) => {
                self.advance();
                let _ = self.eat_keyword(Keyword::Transaction);
                Ok(Statement::Begin)
            }
            Some(Token::Keyword(Keyword::Commit)) => {
                self.advance();
                Ok(Statement::Commit)
            }
            Some(Token::Keyword(Keyword::Rollback)) => {
                self.advance();
                Ok(Statement::Rollback)
            }
            Some(Token::Keyword(Keyword::Create)) => self.parse_create_table(),
            Some(Token::Keyword(Keyword::Drop)) => self.parse_drop_table(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(Token::Keyword(Keyword::Select)) => Ok(Statement::Select(self.parse_select()?)),
            Some(tok) => Err(DbError::SyntaxError {
                message: format!("unsupported statement starting with '{tok}'"),
                position: self.position(),
            }),
            None => Err(DbError::SyntaxError {
                message: "empty statement".into(),
                position: 0,
            }),
        }
    }

    fn parse_create_table(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;

        let mut columns = Vec::new();
        loop {
            let col_name = self.expect_ident()?;
            let ty = self.parse_sql_type()?;
            columns.push(ColumnDef { name: col_name, ty });
            if self.current() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn parse_sql_type(&mut self) -> DbResult<SqlType> {
        match self.advance() {
            Some(Token::Keyword(Keyword::Int)) => Ok(SqlType::Int),
            Some(Token::Keyword(Keyword::Text)) => Ok(SqlType::Text),
            Some(Token::Keyword(Keyword::Date)) => Ok(SqlType::Date),
            Some(Token::Keyword(Keyword::Datetime)) => Ok(SqlType::Datetime),
            Some(tok) => Err(DbError::ValidationError(format!("unknown type '{tok}'"))),
            None => Err(DbError::SyntaxError {
                message: "expected a column type, found end of input".into(),
                position: self.position(),
            }),
        }
    }

    fn parse_drop_table(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Drop)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.expect_ident()?;
        Ok(Statement::DropTable { name })
    }

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_ident()?;

        let columns = if self.current() == Some(&Token::LParen) {
            self.advance();
            let mut names = Vec::new();
            loop {
                names.push(self.expect_ident()?);
                if self.current() == Some(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::RParen)?;
            Some(names)
        } else {
            None
        };

        if self.at_keyword(Keyword::Select) {
            let select = self.parse_select()?;
            return Ok(Statement::Insert {
                table,
                columns,
                source: InsertSource::Select(Box::new(select)),
            });
        }

        self.expect_keyword(Keyword::Values)?;
        let mut rows = Vec::new();
        loop {
            self.expect(Token::LParen)?;
            let mut values = Vec::new();
            loop {
                values.push(self.parse_expr(0)?);
                if self.current() == Some(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::RParen)?;
            rows.push(values);
            if self.current() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        if let Some(names) = &columns {
            for row in &rows {
                if row.len() != names.len() {
                    return Err(DbError::ValidationError(format!(
                        "expected {} values, found {}",
                        names.len(),
                        row.len()
                    )));
                }
            }
        }

        Ok(Statement::Insert {
            table,
            columns,
            source: InsertSource::Values(rows),
        })
    }

    fn parse_delete(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;
        let selection = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        Ok(Statement::Delete { table, selection })
    }

    fn parse_select(&mut self) -> DbResult<SelectStatement> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = self.eat_keyword(Keyword::Distinct);

        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr(0)?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.expect_ident()?)
            } else {
                None
            };
            items.push(SelectItem { expr, alias });
            if self.current() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        self.expect_keyword(Keyword::From)?;
        let from = self.parse_from_clause()?;

        let selection = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        let group_by = if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let limit = if self.eat_keyword(Keyword::Limit) {
            Some(self.parse_limit_value()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            items,
            from,
            selection,
            group_by,
            order_by,
            limit,
        })
    }

    fn parse_table_ref(&mut self) -> DbResult<TableRef> {
        let name = self.expect_ident()?;
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    fn parse_from_clause(&mut self) -> DbResult<FromClause> {
        let mut from = FromClause::Table(self.parse_table_ref()?);
        while self.eat_keyword(Keyword::Join) {
            let right = self.parse_table_ref()?;
            self.expect_keyword(Keyword::On)?;
            let on = self.parse_expr(0)?;
            from = FromClause::Join {
                left: Box::new(from),
                right,
                on,
            };
        }
        Ok(from)
    }

    fn parse_expr_list(&mut self) -> DbResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr(0)?];
        while self.current() == Some(&Token::Comma) {
            self.advance();
            exprs.push(self.parse_expr(0)?);
        }
        Ok(exprs)
    }

    fn parse_order_by_list(&mut self) -> DbResult<Vec<SortItem>> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr(0)?;
            let descending = if self.eat_keyword(Keyword::Desc) {
                true
            } else {
                self.eat_keyword(Keyword::Asc);
                false
            };
            items.push(SortItem { expr, descending });
            if self.current() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(items)
    }

    fn parse_limit_value(&mut self) -> DbResult<i64> {
        match self.advance() {
            Some(Token::Number(text)) if !text.contains('.') => text.parse::<i64>().map_err(|_| {
                DbError::SyntaxError {
                    message: format!("invalid LIMIT value '{text}'"),
                    position: self.position(),
                }
            }),
            Some(tok) => Err(DbError::SyntaxError {
                message: format!("LIMIT must be followed by an integer literal, found '{tok}'"),
                position: self.position(),
            }),
            None => Err(DbError::SyntaxError {
                message: "expected a LIMIT value, found end of input".into(),
                position: self.position(),
            }),
        }
    }

    /// Pratt-precedence expression parser. `min_precedence` resets to 0
    /// inside parentheses.
    fn parse_expr(&mut self, min_precedence: u8) -> DbResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Some(Token::Keyword(Keyword::And)) => BinaryOp::And,
                Some(Token::Keyword(Keyword::Or)) => BinaryOp::Or,
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expr(op.precedence() + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> DbResult<Expr> {
        match self.current() {
            Some(Token::Minus) => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> DbResult<Expr> {
        match self.current() {
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Star) => {
                self.advance();
                Ok(Expr::Star)
            }
            Some(Token::Str(_)) => {
                let Some(Token::Str(text)) = self.advance() else { unreachable!() };
                Ok(Expr::Literal(Value::Text(text)))
            }
            Some(Token::Number(_)) => {
                let Some(Token::Number(text)) = self.advance() else { unreachable!() };
                if text.contains('.') {
                    return Err(DbError::ValidationError(format!(
                        "fractional numeric literal '{text}' has no matching column type"
                    )));
                }
                let value = text.parse::<i64>().map_err(|_| DbError::SyntaxError {
                    message: format!("invalid numeric literal '{text}'"),
                    position: self.position(),
                })?;
                Ok(Expr::Literal(Value::Int(value)))
            }
            Some(Token::Keyword(k @ (Keyword::Count | Keyword::Sum | Keyword::Min | Keyword::Max | Keyword::Avg))) => {
                let func = match k {
                    Keyword::Count => ast::AggregateFunc::Count,
                    Keyword::Sum => ast::AggregateFunc::Sum,
                    Keyword::Min => ast::AggregateFunc::Min,
                    Keyword::Max => ast::AggregateFunc::Max,
                    Keyword::Avg => ast::AggregateFunc::Avg,
                    _ => unreachable!(),
                };
                self.advance();
                self.expect(Token::LParen)?;
                let distinct = self.eat_keyword(Keyword::Distinct);
                let arg = if self.current() == Some(&Token::Star) {
                    self.advance();
                    Expr::Star
                } else {
                    self.parse_expr(0)?
                };
                self.expect(Token::RParen)?;
                Ok(Expr::Aggregate {
                    func,
                    arg: Box::new(arg),
                    distinct,
                })
            }
            Some(Token::Ident(_)) => {
                let Some(Token::Ident(first)) = self.advance() else { unreachable!() };
                if self.current() == Some(&Token::Dot) {
                    self.advance();
                    let name = self.expect_ident()?;
                    Ok(Expr::Column {
                        qualifier: Some(first),
                        name,
                    })
                } else {
                    Ok(Expr::Column {
                        qualifier: None,
                        name: first,
                    })
                }
            }
            Some(tok) => Err(DbError::SyntaxError {
                message: format!("unexpected token '{tok}' in expression"),
                position: self.position(),
            }),
            None => Err(DbError::SyntaxError {
                message: "expected an expression, found end of input".into(),
                position: self.position(),
            }),
        }
    }
}
