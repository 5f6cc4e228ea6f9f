use crate::common::{SortOrder, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::query::explicit::lexer::{tokenize, Token};
use itertools::Itertools;

/// `alias` or `alias.field[.field...]` as written in the query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathExpr {
    pub(crate) alias: String,
    pub(crate) fields: Vec<String>,
}

impl PathExpr {
    pub(crate) fn text(&self) -> String {
        std::iter::once(self.alias.as_str())
            .chain(self.fields.iter().map(|f| f.as_str()))
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Param(String),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare {
        path: PathExpr,
        op: CompareOp,
        operand: Operand,
    },
    Between {
        path: PathExpr,
        lower: Operand,
        upper: Operand,
        negated: bool,
    },
    In {
        path: PathExpr,
        operand: Operand,
        negated: bool,
    },
    Null {
        path: PathExpr,
        negated: bool,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    /// `select m`
    Entity(String),
    /// `select count(m)`
    Count(String),
    /// `select m.a, t.b` or `select new Dto(m.a, t.b)`
    Paths(Vec<PathExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JoinClause {
    pub(crate) path: PathExpr,
    pub(crate) alias: Option<String>,
    pub(crate) fetch: bool,
    pub(crate) left: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectStatement {
    pub(crate) distinct: bool,
    pub(crate) projection: Projection,
    pub(crate) entity: String,
    pub(crate) alias: String,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) condition: Option<Condition>,
    pub(crate) order: Vec<(PathExpr, SortOrder)>,
}

/// Right-hand side of an assignment in `update ... set`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SetExpr {
    Operand(Operand),
    /// `path + operand` or, with `negate`, `path - operand`
    Arithmetic {
        path: PathExpr,
        operand: Operand,
        negate: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UpdateStatement {
    pub(crate) entity: String,
    pub(crate) alias: String,
    pub(crate) assignments: Vec<(PathExpr, SetExpr)>,
    pub(crate) condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeleteStatement {
    pub(crate) entity: String,
    pub(crate) alias: String,
    pub(crate) condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ast {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// Parses query text and returns the statement with its parameter names in
/// order of first appearance.
pub(crate) fn parse(text: &str) -> QuarryResult<(Ast, Vec<String>)> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        text,
        tokens,
        position: 0,
        parameters: Vec::new(),
    };

    let ast = if parser.peek_keyword("select") || parser.peek_keyword("from") {
        Ast::Select(parser.select()?)
    } else if parser.peek_keyword("update") {
        Ast::Update(parser.update()?)
    } else if parser.peek_keyword("delete") {
        Ast::Delete(parser.delete()?)
    } else {
        return Err(parser.error("expected select, update or delete"));
    };

    if parser.position < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok((ast, parser.parameters))
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(Token, usize)>,
    position: usize,
    parameters: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().map(|t| t.is_keyword(keyword)).unwrap_or(false)
    }

    fn peek_symbol(&self, symbol: &str) -> bool {
        self.peek().map(|t| t.is_symbol(symbol)).unwrap_or(false)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(t, _)| t.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn accept_symbol(&mut self, symbol: &str) -> bool {
        if self.peek_symbol(symbol) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> QuarryResult<()> {
        if self.accept_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", keyword)))
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> QuarryResult<()> {
        if self.accept_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", symbol)))
        }
    }

    fn error(&self, reason: &str) -> QuarryError {
        let found = match self.tokens.get(self.position) {
            Some((token, offset)) => format!("'{}' at position {}", token, offset),
            None => "end of query".to_string(),
        };
        log::error!("Cannot parse query {}: {}, found {}", self.text, reason, found);
        QuarryError::new(
            &format!("cannot parse query: {}, found {}", reason, found),
            ErrorKind::QueryDerivationError,
        )
    }

    fn is_reserved(token: &Token) -> bool {
        const RESERVED: [&str; 22] = [
            "select", "from", "where", "join", "left", "inner", "outer", "fetch", "order", "by",
            "and", "or", "not", "in", "is", "null", "between", "set", "update", "delete", "as",
            "distinct",
        ];
        RESERVED.iter().any(|k| token.is_keyword(k))
    }

    fn identifier(&mut self) -> QuarryResult<String> {
        let ident = match self.peek() {
            Some(token @ Token::Ident(ident)) if !Self::is_reserved(token) => ident.clone(),
            _ => return Err(self.error("expected an identifier")),
        };
        self.position += 1;
        Ok(ident)
    }

    fn path(&mut self) -> QuarryResult<PathExpr> {
        let alias = self.identifier()?;
        let mut fields = Vec::new();
        while self.accept_symbol(".") {
            fields.push(self.identifier()?);
        }
        Ok(PathExpr { alias, fields })
    }

    /// `Entity [as] alias`
    fn entity_and_alias(&mut self) -> QuarryResult<(String, String)> {
        let entity = self.identifier()?;
        self.accept_keyword("as");
        let alias = self.identifier()?;
        Ok((entity, alias))
    }

    fn select(&mut self) -> QuarryResult<SelectStatement> {
        let mut distinct = false;
        let mut projection = None;

        if self.accept_keyword("select") {
            distinct = self.accept_keyword("distinct");
            projection = Some(self.projection()?);
        }

        self.expect_keyword("from")?;
        let (entity, alias) = self.entity_and_alias()?;
        let projection = projection.unwrap_or_else(|| Projection::Entity(alias.clone()));

        let mut joins = Vec::new();
        loop {
            let left = self.accept_keyword("left");
            if left {
                self.accept_keyword("outer");
            } else {
                self.accept_keyword("inner");
            }
            if !self.accept_keyword("join") {
                if left {
                    return Err(self.error("expected 'join'"));
                }
                break;
            }
            let fetch = self.accept_keyword("fetch");
            let path = self.path()?;
            let join_alias = if self.accept_keyword("as") || matches!(self.peek(), Some(t @ Token::Ident(_)) if !Self::is_reserved(t)) {
                Some(self.identifier()?)
            } else {
                None
            };
            joins.push(JoinClause {
                path,
                alias: join_alias,
                fetch,
                left,
            });
        }

        let condition = self.where_clause()?;

        let mut order = Vec::new();
        if self.accept_keyword("order") {
            self.expect_keyword("by")?;
            loop {
                let path = self.path()?;
                let direction = if self.accept_keyword("desc") {
                    SortOrder::Descending
                } else {
                    self.accept_keyword("asc");
                    SortOrder::Ascending
                };
                order.push((path, direction));
                if !self.accept_symbol(",") {
                    break;
                }
            }
        }

        Ok(SelectStatement {
            distinct,
            projection,
            entity,
            alias,
            joins,
            condition,
            order,
        })
    }

    fn projection(&mut self) -> QuarryResult<Projection> {
        if self.accept_keyword("count") {
            self.expect_symbol("(")?;
            let target = self.identifier()?;
            self.expect_symbol(")")?;
            return Ok(Projection::Count(target));
        }

        if self.accept_keyword("new") {
            // constructor expressions name a DTO; only the argument paths matter
            self.identifier()?;
            while self.accept_symbol(".") {
                self.identifier()?;
            }
            self.expect_symbol("(")?;
            let paths = self.path_list()?;
            self.expect_symbol(")")?;
            return Ok(Projection::Paths(paths));
        }

        let paths = self.path_list()?;
        if paths.len() == 1 && paths[0].fields.is_empty() {
            return Ok(Projection::Entity(paths[0].alias.clone()));
        }
        Ok(Projection::Paths(paths))
    }

    fn path_list(&mut self) -> QuarryResult<Vec<PathExpr>> {
        let mut paths = vec![self.path()?];
        while self.accept_symbol(",") {
            paths.push(self.path()?);
        }
        Ok(paths)
    }

    fn update(&mut self) -> QuarryResult<UpdateStatement> {
        self.expect_keyword("update")?;
        let (entity, alias) = self.entity_and_alias()?;
        self.expect_keyword("set")?;

        let mut assignments = Vec::new();
        loop {
            let target = self.path()?;
            self.expect_symbol("=")?;
            let expr = if matches!(self.peek(), Some(Token::Ident(_)))
                && !self.peek_keyword("true")
                && !self.peek_keyword("false")
                && !self.peek_keyword("null")
            {
                let path = self.path()?;
                let negate = if self.accept_symbol("+") {
                    false
                } else if self.accept_symbol("-") {
                    true
                } else {
                    return Err(self.error("expected '+' or '-'"));
                };
                let operand = self.operand()?;
                SetExpr::Arithmetic {
                    path,
                    operand,
                    negate,
                }
            } else {
                SetExpr::Operand(self.operand()?)
            };
            assignments.push((target, expr));
            if !self.accept_symbol(",") {
                break;
            }
        }

        let condition = self.where_clause()?;
        Ok(UpdateStatement {
            entity,
            alias,
            assignments,
            condition,
        })
    }

    fn delete(&mut self) -> QuarryResult<DeleteStatement> {
        self.expect_keyword("delete")?;
        self.expect_keyword("from")?;
        let (entity, alias) = self.entity_and_alias()?;
        let condition = self.where_clause()?;
        Ok(DeleteStatement {
            entity,
            alias,
            condition,
        })
    }

    fn where_clause(&mut self) -> QuarryResult<Option<Condition>> {
        if self.accept_keyword("where") {
            Ok(Some(self.or_condition()?))
        } else {
            Ok(None)
        }
    }

    fn or_condition(&mut self) -> QuarryResult<Condition> {
        let mut condition = self.and_condition()?;
        while self.accept_keyword("or") {
            let right = self.and_condition()?;
            condition = Condition::Or(Box::new(condition), Box::new(right));
        }
        Ok(condition)
    }

    fn and_condition(&mut self) -> QuarryResult<Condition> {
        let mut condition = self.unary_condition()?;
        while self.accept_keyword("and") {
            let right = self.unary_condition()?;
            condition = Condition::And(Box::new(condition), Box::new(right));
        }
        Ok(condition)
    }

    fn unary_condition(&mut self) -> QuarryResult<Condition> {
        if self.accept_keyword("not") {
            return Ok(Condition::Not(Box::new(self.unary_condition()?)));
        }
        if self.accept_symbol("(") {
            let condition = self.or_condition()?;
            self.expect_symbol(")")?;
            return Ok(condition);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> QuarryResult<Condition> {
        let path = self.path()?;

        if self.accept_keyword("is") {
            let negated = self.accept_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Condition::Null { path, negated });
        }

        let negated = self.accept_keyword("not");
        if self.accept_keyword("in") {
            let operand = self.in_operand()?;
            return Ok(Condition::In {
                path,
                operand,
                negated,
            });
        }
        if self.accept_keyword("between") {
            let lower = self.operand()?;
            self.expect_keyword("and")?;
            let upper = self.operand()?;
            return Ok(Condition::Between {
                path,
                lower,
                upper,
                negated,
            });
        }
        if negated {
            return Err(self.error("expected 'in' or 'between' after 'not'"));
        }

        let op = match self.advance() {
            Some(Token::Symbol(symbol)) => match symbol.as_str() {
                "=" => CompareOp::Eq,
                "<>" | "!=" => CompareOp::Ne,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Gte,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Lte,
                _ => {
                    self.position -= 1;
                    return Err(self.error("expected a comparison operator"));
                }
            },
            Some(_) => {
                self.position -= 1;
                return Err(self.error("expected a comparison operator"));
            }
            None => return Err(self.error("expected a comparison operator")),
        };
        let operand = self.operand()?;
        Ok(Condition::Compare { path, op, operand })
    }

    /// `:param` or a parenthesised literal list.
    fn in_operand(&mut self) -> QuarryResult<Operand> {
        if self.accept_symbol("(") {
            let mut values = Vec::new();
            loop {
                match self.operand()? {
                    Operand::Literal(value) => values.push(value),
                    Operand::Param(_) => {
                        return Err(self.error("in-lists take literals or a single parameter"))
                    }
                }
                if !self.accept_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
            return Ok(Operand::Literal(Value::Array(values)));
        }
        self.operand()
    }

    fn operand(&mut self) -> QuarryResult<Operand> {
        let negative = self.accept_symbol("-");
        let operand = match self.advance() {
            Some(Token::Param(name)) if !negative => {
                if !self.parameters.contains(&name) {
                    self.parameters.push(name.clone());
                }
                Operand::Param(name)
            }
            Some(Token::Number(value)) => {
                if negative {
                    Operand::Literal(value.negate()?)
                } else {
                    Operand::Literal(value)
                }
            }
            Some(Token::Str(text)) if !negative => Operand::Literal(Value::String(text)),
            Some(token) if !negative && token.is_keyword("true") => Operand::Literal(Value::Bool(true)),
            Some(token) if !negative && token.is_keyword("false") => Operand::Literal(Value::Bool(false)),
            Some(token) if !negative && token.is_keyword("null") => Operand::Literal(Value::Null),
            Some(_) => {
                self.position -= 1;
                return Err(self.error("expected a parameter or literal"));
            }
            None => return Err(self.error("expected a parameter or literal")),
        };
        Ok(operand)
    }
}
