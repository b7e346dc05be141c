//! Recursive-descent matcher parser
//!
//! Binds every `key.field` reference to a position while parsing, so unknown
//! fields, relations and functions surface as configuration errors at model
//! construction.

use super::lexer::{tokenize, Spanned, Token};
use super::{Expr, Operand, Scope};
use tessera_core::{Result, TesseraError};

#[derive(Debug)]
pub(super) struct Compiled {
    pub expr: Expr,
    pub request_key: Option<String>,
    pub policy_key: Option<String>,
}

pub(super) fn parse(text: &str, scope: Scope<'_>) -> Result<Compiled> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(TesseraError::configuration("matcher is empty"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope,
        request_key: None,
        policy_key: None,
    };
    let expr = parser.expr()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(parser.error_at(extra, "unexpected trailing input"));
    }
    Ok(Compiled {
        expr,
        request_key: parser.request_key,
        policy_key: parser.policy_key,
    })
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    scope: Scope<'a>,
    request_key: Option<String>,
    policy_key: Option<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(s) if s.token == expected => Ok(()),
            Some(s) => Err(self.error_at(&s, &format!("expected {}", expected.describe()))),
            None => Err(TesseraError::configuration(format!(
                "matcher ended early, expected {}",
                expected.describe()
            ))),
        }
    }

    fn error_at(&self, at: &Spanned, message: &str) -> TesseraError {
        TesseraError::configuration(format!(
            "{message}, found {} at offset {}",
            at.token.describe(),
            at.offset
        ))
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.eat(&Token::LParen) {
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        if let (Some(Token::Ident(_)), Some(Token::LParen)) = (self.peek(), self.peek_at(1)) {
            return self.call();
        }

        let left = self.operand()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => {
                return Err(TesseraError::configuration(
                    "operand used as a condition; compare it with `==` or `!=`",
                ))
            }
        };
        self.pos += 1;
        let right = self.operand()?;
        let eq = Expr::Equals(left, right);
        Ok(if negate { Expr::Not(Box::new(eq)) } else { eq })
    }

    fn call(&mut self) -> Result<Expr> {
        let Some(head) = self.advance() else {
            return Err(TesseraError::configuration("matcher ended early"));
        };
        let Token::Ident(name) = &head.token else {
            return Err(self.error_at(&head, "expected a relation name"));
        };
        let Some((relation, _, def)) = self.scope.relations.get_full(name.as_str()) else {
            return Err(TesseraError::configuration(format!(
                "unsupported function or undeclared relation `{name}` at offset {}",
                head.offset
            )));
        };
        let arity = def.arity();
        let relation_name = def.name().to_string();
        self.expect(Token::LParen)?;

        let mut args = vec![self.operand()?];
        while self.eat(&Token::Comma) {
            args.push(self.operand()?);
        }
        self.expect(Token::RParen)?;

        if args.len() != arity {
            return Err(TesseraError::configuration(format!(
                "relation `{relation_name}` takes {arity} arguments, matcher passes {}",
                args.len()
            )));
        }
        let mut args = args.into_iter();
        let (Some(from), Some(to)) = (args.next(), args.next()) else {
            return Err(TesseraError::configuration(format!(
                "relation `{relation_name}` needs a member and a parent"
            )));
        };
        Ok(Expr::Membership {
            relation,
            from,
            to,
            domain: args.next(),
        })
    }

    fn operand(&mut self) -> Result<Operand> {
        let Some(head) = self.advance() else {
            return Err(TesseraError::configuration(
                "matcher ended early, expected an operand",
            ));
        };
        match head.token {
            Token::Str(value) => Ok(Operand::Literal(value)),
            Token::Ident(ref key) => {
                let key = key.clone();
                self.expect(Token::Dot)?;
                let field = match self.advance() {
                    Some(Spanned {
                        token: Token::Ident(field),
                        ..
                    }) => field,
                    Some(other) => return Err(self.error_at(&other, "expected a field name")),
                    None => {
                        return Err(TesseraError::configuration(
                            "matcher ended early, expected a field name",
                        ))
                    }
                };
                self.bind(&key, &field)
            }
            _ => Err(self.error_at(&head, "expected a field reference or string")),
        }
    }

    fn bind(&mut self, key: &str, field: &str) -> Result<Operand> {
        if let Some(schema) = self.scope.requests.get(key) {
            let idx = schema.index_of(field).ok_or_else(|| {
                TesseraError::configuration(format!("request `{key}` has no field `{field}`"))
            })?;
            claim(&mut self.request_key, key, "request")?;
            return Ok(Operand::Request(idx));
        }
        if let Some(schema) = self.scope.policies.get(key) {
            let idx = schema.index_of(field).ok_or_else(|| {
                TesseraError::configuration(format!("policy `{key}` has no field `{field}`"))
            })?;
            claim(&mut self.policy_key, key, "policy")?;
            return Ok(Operand::Policy(idx));
        }
        Err(TesseraError::configuration(format!(
            "`{key}.{field}` refers to an undeclared request or policy"
        )))
    }
}

fn claim(slot: &mut Option<String>, key: &str, what: &str) -> Result<()> {
    match slot {
        Some(existing) if existing != key => Err(TesseraError::configuration(format!(
            "matcher mixes {what} keys `{existing}` and `{key}`"
        ))),
        Some(_) => Ok(()),
        None => {
            *slot = Some(key.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PolicySchema, RelationDefinition, RequestSchema};
    use assert_matches::assert_matches;
    use indexmap::IndexMap;

    struct Decls {
        requests: IndexMap<String, RequestSchema>,
        policies: IndexMap<String, PolicySchema>,
        relations: IndexMap<String, RelationDefinition>,
    }

    impl Decls {
        fn domain_rbac() -> Self {
            let fields = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
            let mut requests = IndexMap::new();
            requests.insert(
                "r".to_string(),
                RequestSchema::new("r", fields(&["sub", "dom", "obj", "act"])).unwrap(),
            );
            let mut policies = IndexMap::new();
            policies.insert(
                "p".to_string(),
                PolicySchema::new("p", fields(&["sub", "dom", "obj", "act", "eft"])).unwrap(),
            );
            policies.insert(
                "p2".to_string(),
                PolicySchema::new("p2", fields(&["sub", "act"])).unwrap(),
            );
            let mut relations = IndexMap::new();
            relations.insert("g".to_string(), RelationDefinition::new("g", 3).unwrap());
            relations.insert("g2".to_string(), RelationDefinition::new("g2", 2).unwrap());
            Self {
                requests,
                policies,
                relations,
            }
        }

        fn scope(&self) -> Scope<'_> {
            Scope {
                requests: &self.requests,
                policies: &self.policies,
                relations: &self.relations,
            }
        }
    }

    #[test]
    fn test_parse_domain_matcher() {
        let decls = Decls::domain_rbac();
        let compiled = parse(
            "g(r.sub, p.sub, r.dom) && g2(r.obj, p.obj) && r.dom == p.dom && r.act == p.act",
            decls.scope(),
        )
        .unwrap();
        assert_eq!(compiled.request_key.as_deref(), Some("r"));
        assert_eq!(compiled.policy_key.as_deref(), Some("p"));
        assert_eq!(compiled.expr.relations(), vec![0, 1]);

        // left-associative: (((g && g2) && dom) && act)
        let Expr::And(left, right) = compiled.expr else {
            panic!("expected conjunction");
        };
        assert_eq!(*right, Expr::Equals(Operand::Request(3), Operand::Policy(3)));
        assert_matches!(*left, Expr::And(..));
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let decls = Decls::domain_rbac();
        let compiled = parse(
            "r.sub == p.sub && r.act == p.act || r.sub == \"root\"",
            decls.scope(),
        )
        .unwrap();
        assert_matches!(compiled.expr, Expr::Or(ref a, _) if matches!(**a, Expr::And(..)));
    }

    #[test]
    fn test_not_equal_and_negation() {
        let decls = Decls::domain_rbac();
        let compiled = parse("!(r.sub != p.sub)", decls.scope()).unwrap();
        assert_eq!(
            compiled.expr,
            Expr::Not(Box::new(Expr::Not(Box::new(Expr::Equals(
                Operand::Request(0),
                Operand::Policy(0)
            )))))
        );
    }

    #[test]
    fn test_configuration_errors() {
        let decls = Decls::domain_rbac();
        let cases = [
            "keyMatch2(r.obj, p.obj)",
            "g(r.sub, p.sub)",
            "g2(r.obj, p.obj, r.dom)",
            "r.owner == p.sub",
            "q.sub == p.sub",
            "r.sub",
            "r.sub == p.sub &&",
            "(r.sub == p.sub",
            "r.sub == p.sub p.act",
            "r.sub == p.sub && r.act == p2.act",
            "",
        ];
        for case in cases {
            assert_matches!(
                parse(case, decls.scope()),
                Err(TesseraError::Configuration { .. }),
                "{case}"
            );
        }
    }
}
