use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use chumsky::Stream;

use crate::ast::nodes::{
    BinaryOp, Block, CompareOp, Comprehension, Expr, FStringPart, Function, Ident, Literal,
    LogicalOp, Param, Program, Statement, Target, UnaryOp,
};
use crate::lexer::token::{Span, Token, TokenKind};
use crate::utils::errors::{Diagnostic, DiagnosticSeverity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub message: String,
    pub span: Span,
}

impl ParserError {
    pub fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::Error,
            source_id,
            self.span,
            self.message.clone(),
        )
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<Simple<TokenKind>> for ParserError {
    fn from(value: Simple<TokenKind>) -> Self {
        let span = Span::from(value.span());
        let message = match value.reason() {
            SimpleReason::Custom(message) => message.clone(),
            SimpleReason::Unclosed { delimiter, .. } => {
                format!("unclosed delimiter {delimiter}")
            }
            SimpleReason::Unexpected => {
                let mut expected: Vec<String> = value
                    .expected()
                    .filter_map(|kind| kind.as_ref().map(ToString::to_string))
                    .collect();
                expected.sort();
                expected.dedup();
                let found = value
                    .found()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "end of input".to_string());
                if expected.is_empty() || expected.len() > 6 {
                    format!("unexpected {found}")
                } else {
                    format!("unexpected {found}, expected {}", expected.join(", "))
                }
            }
        };
        Self { message, span }
    }
}

fn token_stream(
    tokens: &[Token],
) -> Stream<'_, TokenKind, std::ops::Range<usize>, impl Iterator<Item = (TokenKind, std::ops::Range<usize>)> + '_>
{
    let end = tokens.last().map(|token| token.span.end()).unwrap_or(0);
    Stream::from_iter(
        end..end + 1,
        tokens
            .iter()
            .map(|token| (token.kind.clone(), token.span.into())),
    )
}

pub fn parse(tokens: &[Token]) -> Result<Program, Vec<ParserError>> {
    program_parser()
        .parse(token_stream(tokens))
        .map_err(|errors| errors.into_iter().map(ParserError::from).collect())
}

/// Parses a single expression, e.g. a type annotation written in a manifest.
pub fn parse_expression(tokens: &[Token]) -> Result<Expr, Vec<ParserError>> {
    expr_parser()
        .then_ignore(just(TokenKind::Newline).repeated())
        .then_ignore(just(TokenKind::Eof))
        .parse(token_stream(tokens))
        .map_err(|errors| errors.into_iter().map(ParserError::from).collect())
}

fn identifier_parser() -> impl Parser<TokenKind, String, Error = Simple<TokenKind>> + Clone {
    select! { TokenKind::Identifier(name) => name }
}

fn ident_parser() -> impl Parser<TokenKind, Ident, Error = Simple<TokenKind>> + Clone {
    identifier_parser().map_with_span(|name, span: std::ops::Range<usize>| {
        Ident::new(name, Span::from(span))
    })
}

fn parse_number(text: &str) -> Result<Literal, String> {
    let clean = text.replace('_', "");
    if clean.contains(['.', 'e', 'E']) {
        clean
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| format!("invalid float literal `{text}`"))
    } else {
        clean
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| format!("integer literal `{text}` does not fit in 64 bits"))
    }
}

/// Splits f-string content into literal text and `{expr[!conv][:spec]}` fields.
pub(crate) fn parse_fstring(content: &str) -> Result<Vec<FStringPart>, String> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '}' => return Err("single `}` is not allowed in f-string".to_string()),
            '{' => {
                if !text.is_empty() {
                    parts.push(FStringPart::Text(std::mem::take(&mut text)));
                }

                let mut field = String::new();
                let mut depth = 0usize;
                let mut quote: Option<char> = None;
                let mut closed = false;
                for ch in chars.by_ref() {
                    match (ch, quote) {
                        (q, Some(open)) if q == open => quote = None,
                        (_, Some(_)) => {}
                        ('\'' | '"', None) => quote = Some(ch),
                        ('(' | '[' | '{', None) => depth += 1,
                        (')' | ']', None) => depth = depth.saturating_sub(1),
                        ('}', None) if depth == 0 => {
                            closed = true;
                            break;
                        }
                        ('}', None) => depth -= 1,
                        _ => {}
                    }
                    field.push(ch);
                }
                if !closed {
                    return Err("unterminated `{` in f-string".to_string());
                }
                parts.push(parse_fstring_field(&field)?);
            }
            other => text.push(other),
        }
    }

    if !text.is_empty() {
        parts.push(FStringPart::Text(text));
    }
    Ok(parts)
}

fn parse_fstring_field(field: &str) -> Result<FStringPart, String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut split_at = None;
    let bytes: Vec<(usize, char)> = field.char_indices().collect();

    for (position, &(idx, ch)) in bytes.iter().enumerate() {
        match (ch, quote) {
            (q, Some(open)) if q == open => quote = None,
            (_, Some(_)) => {}
            ('\'' | '"', None) => quote = Some(ch),
            ('(' | '[' | '{', None) => depth += 1,
            (')' | ']' | '}', None) => depth = depth.saturating_sub(1),
            ('!', None)
                if depth == 0
                    && bytes.get(position + 1).is_some_and(|(_, next)| *next != '=') =>
            {
                split_at = Some(idx);
                break;
            }
            (':', None) if depth == 0 => {
                split_at = Some(idx);
                break;
            }
            _ => {}
        }
    }

    let (source, rest) = match split_at {
        Some(idx) => (&field[..idx], &field[idx..]),
        None => (field, ""),
    };

    let (conversion, spec) = if let Some(after) = rest.strip_prefix('!') {
        let mut rest_chars = after.chars();
        let conversion = rest_chars
            .next()
            .filter(|c| matches!(c, 'r' | 's' | 'a'))
            .ok_or_else(|| format!("invalid conversion in f-string field `{field}`"))?;
        let tail = rest_chars.as_str();
        let spec = tail.strip_prefix(':').map(str::to_string);
        (Some(conversion), spec)
    } else {
        (None, rest.strip_prefix(':').map(str::to_string))
    };

    let source = source.trim();
    if source.is_empty() {
        return Err("empty expression in f-string".to_string());
    }
    let tokens = crate::lexer::tokenize(source)
        .map_err(|errors| format!("invalid f-string expression `{source}`: {}", errors[0]))?;
    let expr = parse_expression(&tokens)
        .map_err(|errors| format!("invalid f-string expression `{source}`: {}", errors[0]))?;

    Ok(FStringPart::Expr {
        expr: Box::new(expr),
        conversion,
        spec,
    })
}

enum StrPiece {
    Plain(String),
    Format(Vec<FStringPart>),
}

fn string_parser() -> impl Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone {
    filter_map(|span, token| match token {
        TokenKind::StringLiteral(value) => Ok(StrPiece::Plain(value)),
        TokenKind::FString(content) => parse_fstring(&content)
            .map(StrPiece::Format)
            .map_err(|message| Simple::custom(span, message)),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    })
    .repeated()
    .at_least(1)
    .map(|pieces| {
        if pieces.iter().all(|piece| matches!(piece, StrPiece::Plain(_))) {
            let joined = pieces
                .into_iter()
                .map(|piece| match piece {
                    StrPiece::Plain(value) => value,
                    StrPiece::Format(_) => String::new(),
                })
                .collect();
            return Expr::Literal(Literal::Str(joined));
        }
        let parts = pieces
            .into_iter()
            .flat_map(|piece| match piece {
                StrPiece::Plain(value) => vec![FStringPart::Text(value)],
                StrPiece::Format(parts) => parts,
            })
            .collect();
        Expr::FString(parts)
    })
}

fn literal_expr_parser() -> impl Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone {
    let number = filter_map(|span, token| match token {
        TokenKind::Number(text) => parse_number(&text)
            .map(Expr::Literal)
            .map_err(|message| Simple::custom(span, message)),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    });
    let constant = select! {
        TokenKind::True => Expr::Literal(Literal::Bool(true)),
        TokenKind::False => Expr::Literal(Literal::Bool(false)),
        TokenKind::None => Expr::Literal(Literal::None),
    };
    choice((string_parser(), number, constant))
}

fn expr_to_target(expr: Expr) -> Result<Target, String> {
    match expr {
        Expr::Name(ident) => Ok(Target::Name(ident)),
        Expr::Attribute { object, attr, span } => Ok(Target::Attribute {
            object: *object,
            attr,
            span,
        }),
        Expr::Index { object, index } => Ok(Target::Index {
            object: *object,
            index: *index,
        }),
        Expr::Tuple(items) | Expr::List(items) => items
            .into_iter()
            .map(expr_to_target)
            .collect::<Result<Vec<_>, _>>()
            .map(Target::Tuple),
        _ => Err("cannot assign to this expression".to_string()),
    }
}

/// `a, b` style target lists used by `for` loops and comprehensions.
fn target_list_parser() -> impl Parser<TokenKind, Target, Error = Simple<TokenKind>> + Clone {
    recursive(|target_list| {
        let atom = ident_parser().map(Target::Name).or(target_list
            .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen)));
        atom.clone()
            .then(just(TokenKind::Comma).ignore_then(atom).repeated())
            .then(just(TokenKind::Comma).or_not())
            .map(|((first, rest), trailing)| {
                if rest.is_empty() && trailing.is_none() {
                    first
                } else {
                    let mut items = vec![first];
                    items.extend(rest);
                    Target::Tuple(items)
                }
            })
    })
}

/// Comma-separated expressions collapse to a single expression unless a comma is present.
fn expr_list_parser<P>(expr: P) -> impl Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone
where
    P: Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone,
{
    expr.clone()
        .then(just(TokenKind::Comma).ignore_then(expr).repeated())
        .then(just(TokenKind::Comma).or_not())
        .map(|((first, rest), trailing)| {
            if rest.is_empty() && trailing.is_none() {
                first
            } else {
                let mut items = vec![first];
                items.extend(rest);
                Expr::Tuple(items)
            }
        })
}

fn param_list_parser<P>(
    expr: P,
    annotated: bool,
) -> impl Parser<TokenKind, Vec<Param>, Error = Simple<TokenKind>> + Clone
where
    P: Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone + 'static,
{
    let annotation = just(TokenKind::Colon).ignore_then(expr.clone());
    let annotation = if annotated {
        annotation.or_not().boxed()
    } else {
        empty().to(None).boxed()
    };

    identifier_parser()
        .then(annotation)
        .then(just(TokenKind::Equals).ignore_then(expr).or_not())
        .map_with_span(|((name, annotation), default), span: std::ops::Range<usize>| Param {
            name,
            annotation,
            default,
            span: Span::from(span),
        })
        .separated_by(just(TokenKind::Comma))
        .allow_trailing()
}

enum Postfix {
    Call(Vec<Expr>, Vec<(String, Expr)>, Span),
    Attribute(String, Span),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>, Option<Expr>),
}

enum CallArg {
    Positional(Expr),
    Keyword(String, Expr),
}

fn expr_parser() -> impl Parser<TokenKind, Expr, Error = Simple<TokenKind>> + Clone {
    recursive(|expr| {
        let comprehension = just(TokenKind::For)
            .ignore_then(target_list_parser())
            .then_ignore(just(TokenKind::In))
            .then(expr.clone())
            .then(just(TokenKind::If).ignore_then(expr.clone()).repeated())
            .map(|((target, iterable), conditions)| Comprehension {
                target,
                iterable,
                conditions,
            })
            .repeated()
            .at_least(1)
            .boxed();

        let paren = just(TokenKind::LParen)
            .ignore_then(
                expr.clone()
                    .then(comprehension.clone())
                    .map(|(element, clauses)| Expr::ListComp {
                        element: Box::new(element),
                        clauses,
                    })
                    .or(expr_list_parser(expr.clone()))
                    .or_not(),
            )
            .then_ignore(just(TokenKind::RParen))
            .map(|inner| inner.unwrap_or(Expr::Tuple(Vec::new())));

        let list = just(TokenKind::LBracket)
            .ignore_then(
                expr.clone()
                    .then(comprehension.clone())
                    .map(|(element, clauses)| Expr::ListComp {
                        element: Box::new(element),
                        clauses,
                    })
                    .or(expr
                        .clone()
                        .separated_by(just(TokenKind::Comma))
                        .allow_trailing()
                        .map(Expr::List)),
            )
            .then_ignore(just(TokenKind::RBracket));

        let pair = expr
            .clone()
            .then_ignore(just(TokenKind::Colon))
            .then(expr.clone());
        let close = || just(TokenKind::RBrace);
        let dict = just(TokenKind::LBrace)
            .ignore_then(choice((
                pair.clone()
                    .then(comprehension.clone())
                    .then_ignore(close())
                    .map(|((key, value), clauses)| Expr::DictComp {
                        key: Box::new(key),
                        value: Box::new(value),
                        clauses,
                    }),
                pair.separated_by(just(TokenKind::Comma))
                    .allow_trailing()
                    .then_ignore(close())
                    .map(Expr::Dict),
                expr.clone()
                    .then(comprehension.clone())
                    .then_ignore(close())
                    .map(|(element, clauses)| Expr::SetComp {
                        element: Box::new(element),
                        clauses,
                    }),
                expr.clone()
                    .separated_by(just(TokenKind::Comma))
                    .at_least(1)
                    .allow_trailing()
                    .then_ignore(close())
                    .map(Expr::Set),
            )));

        let atom = choice((
            literal_expr_parser(),
            ident_parser().map(Expr::Name),
            paren,
            list,
            dict,
        ))
        .boxed();

        let call_arg = identifier_parser()
            .then_ignore(just(TokenKind::Equals))
            .then(expr.clone())
            .map(|(name, value)| CallArg::Keyword(name, value))
            .or(expr
                .clone()
                .then(comprehension.clone().or_not())
                .map(|(element, clauses)| match clauses {
                    Some(clauses) => CallArg::Positional(Expr::ListComp {
                        element: Box::new(element),
                        clauses,
                    }),
                    None => CallArg::Positional(element),
                }));

        let call_suffix = call_arg
            .separated_by(just(TokenKind::Comma))
            .allow_trailing()
            .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen))
            .try_map(|call_args, span: std::ops::Range<usize>| {
                let mut args = Vec::new();
                let mut kwargs = Vec::new();
                for arg in call_args {
                    match arg {
                        CallArg::Positional(value) if kwargs.is_empty() => args.push(value),
                        CallArg::Positional(_) => {
                            return Err(Simple::custom(
                                span,
                                "positional argument follows keyword argument",
                            ));
                        }
                        CallArg::Keyword(name, value) => kwargs.push((name, value)),
                    }
                }
                Ok(Postfix::Call(args, kwargs, Span::from(span)))
            });

        let attribute_suffix = just(TokenKind::Dot)
            .ignore_then(identifier_parser())
            .map_with_span(|name, span: std::ops::Range<usize>| {
                Postfix::Attribute(name, Span::from(span))
            });

        let slice = expr
            .clone()
            .or_not()
            .then_ignore(just(TokenKind::Colon))
            .then(expr.clone().or_not())
            .then(just(TokenKind::Colon).ignore_then(expr.clone().or_not()).or_not())
            .map(|((start, stop), step)| Postfix::Slice(start, stop, step.flatten()));
        let subscript_suffix = slice
            .or(expr_list_parser(expr.clone()).map(Postfix::Index))
            .delimited_by(just(TokenKind::LBracket), just(TokenKind::RBracket));

        let postfix = atom
            .then(choice((call_suffix, attribute_suffix, subscript_suffix)).repeated())
            .foldl(|object, suffix| match suffix {
                Postfix::Call(args, kwargs, span) => Expr::Call {
                    func: Box::new(object),
                    args,
                    kwargs,
                    span,
                },
                Postfix::Attribute(attr, span) => Expr::Attribute {
                    object: Box::new(object),
                    attr,
                    span,
                },
                Postfix::Index(index) => Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                },
                Postfix::Slice(start, stop, step) => Expr::Slice {
                    object: Box::new(object),
                    start: start.map(Box::new),
                    stop: stop.map(Box::new),
                    step: step.map(Box::new),
                },
            })
            .boxed();

        // `**` binds tighter than unary minus on its left, looser on its right.
        let unary = recursive(|unary| {
            let power = postfix
                .clone()
                .then(just(TokenKind::DoubleStar).ignore_then(unary.clone()).or_not())
                .map(|(base, exponent)| match exponent {
                    Some(exponent) => Expr::Binary {
                        left: Box::new(base),
                        op: BinaryOp::Pow,
                        right: Box::new(exponent),
                    },
                    None => base,
                });

            choice((
                just(TokenKind::Minus).to(UnaryOp::Neg),
                just(TokenKind::Plus).to(UnaryOp::Pos),
            ))
            .then(unary)
            .map(|(op, operand)| Expr::Unary {
                op,
                operand: Box::new(operand),
            })
            .or(power)
        })
        .boxed();

        let product = unary
            .clone()
            .then(
                choice((
                    just(TokenKind::Star).to(BinaryOp::Mul),
                    just(TokenKind::Slash).to(BinaryOp::Div),
                    just(TokenKind::DoubleSlash).to(BinaryOp::FloorDiv),
                    just(TokenKind::Percent).to(BinaryOp::Mod),
                ))
                .then(unary)
                .repeated(),
            )
            .foldl(|left, (op, right)| Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })
            .boxed();

        let sum = product
            .clone()
            .then(
                choice((
                    just(TokenKind::Plus).to(BinaryOp::Add),
                    just(TokenKind::Minus).to(BinaryOp::Sub),
                ))
                .then(product)
                .repeated(),
            )
            .foldl(|left, (op, right)| Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })
            .boxed();

        let compare_op = choice((
            just(TokenKind::EqEq).to(CompareOp::Eq),
            just(TokenKind::NotEq).to(CompareOp::NotEq),
            just(TokenKind::LtEq).to(CompareOp::LtEq),
            just(TokenKind::GtEq).to(CompareOp::GtEq),
            just(TokenKind::Lt).to(CompareOp::Lt),
            just(TokenKind::Gt).to(CompareOp::Gt),
            just(TokenKind::In).to(CompareOp::In),
            just(TokenKind::Not)
                .then(just(TokenKind::In))
                .to(CompareOp::NotIn),
            just(TokenKind::Is)
                .then(just(TokenKind::Not))
                .to(CompareOp::IsNot),
            just(TokenKind::Is).to(CompareOp::Is),
        ));

        let comparison = sum
            .clone()
            .then(compare_op.then(sum).repeated())
            .map(|(left, rest)| {
                if rest.is_empty() {
                    left
                } else {
                    Expr::Compare {
                        left: Box::new(left),
                        rest,
                    }
                }
            })
            .boxed();

        let not_test = recursive(|not_test| {
            just(TokenKind::Not)
                .ignore_then(not_test)
                .map(|operand| Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
                .or(comparison)
        })
        .boxed();

        let and_test = not_test
            .clone()
            .then(just(TokenKind::And).ignore_then(not_test).repeated())
            .foldl(|left, right| Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
            })
            .boxed();

        let or_test = and_test
            .clone()
            .then(just(TokenKind::Or).ignore_then(and_test).repeated())
            .foldl(|left, right| Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
            })
            .boxed();

        let ternary = or_test
            .clone()
            .then(
                just(TokenKind::If)
                    .ignore_then(or_test)
                    .then_ignore(just(TokenKind::Else))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(then, branch)| match branch {
                Some((cond, otherwise)) => Expr::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                None => then,
            });

        let lambda = just(TokenKind::Lambda)
            .ignore_then(param_list_parser(expr.clone(), false))
            .then_ignore(just(TokenKind::Colon))
            .then(expr)
            .map(|(params, body)| Expr::Lambda {
                params,
                body: Box::new(body),
            });

        lambda.or(ternary)
    })
}

enum AssignTail {
    Plain(Vec<Expr>),
    Augmented(BinaryOp, Expr),
}

fn module_path_parser() -> impl Parser<TokenKind, String, Error = Simple<TokenKind>> + Clone {
    identifier_parser()
        .separated_by(just(TokenKind::Dot))
        .at_least(1)
        .map(|segments| segments.join("."))
}

fn simple_statement_parser(
) -> impl Parser<TokenKind, Statement, Error = Simple<TokenKind>> + Clone {
    let expr = expr_parser().boxed();
    let expr_list = expr_list_parser(expr.clone()).boxed();

    let return_stmt = just(TokenKind::Return)
        .ignore_then(expr_list.clone().or_not())
        .map(Statement::Return);

    let pass_stmt = just(TokenKind::Pass).to(Statement::Pass);
    let break_stmt = just(TokenKind::Break)
        .map_with_span(|_, span: std::ops::Range<usize>| Statement::Break(Span::from(span)));
    let continue_stmt = just(TokenKind::Continue)
        .map_with_span(|_, span: std::ops::Range<usize>| Statement::Continue(Span::from(span)));

    let raise_stmt = just(TokenKind::Raise)
        .ignore_then(expr.clone().or_not())
        .then_ignore(just(TokenKind::From).then(expr.clone()).or_not())
        .map(Statement::Raise);

    let import_stmt = just(TokenKind::Import)
        .ignore_then(module_path_parser())
        .then(just(TokenKind::As).ignore_then(identifier_parser()).or_not())
        .map_with_span(|(module, alias), span: std::ops::Range<usize>| Statement::Import {
            module,
            alias,
            span: Span::from(span),
        });

    let import_name = identifier_parser()
        .then(just(TokenKind::As).ignore_then(identifier_parser()).or_not());
    let from_import_stmt = just(TokenKind::From)
        .ignore_then(module_path_parser())
        .then_ignore(just(TokenKind::Import))
        .then(
            import_name
                .clone()
                .separated_by(just(TokenKind::Comma))
                .at_least(1)
                .allow_trailing()
                .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen))
                .or(import_name.separated_by(just(TokenKind::Comma)).at_least(1)),
        )
        .map_with_span(|(module, names), span: std::ops::Range<usize>| Statement::FromImport {
            module,
            names,
            span: Span::from(span),
        });

    let aug_op = choice((
        just(TokenKind::PlusEq).to(BinaryOp::Add),
        just(TokenKind::MinusEq).to(BinaryOp::Sub),
        just(TokenKind::StarEq).to(BinaryOp::Mul),
        just(TokenKind::SlashEq).to(BinaryOp::Div),
        just(TokenKind::DoubleSlashEq).to(BinaryOp::FloorDiv),
        just(TokenKind::PercentEq).to(BinaryOp::Mod),
    ));

    let assign_or_expr = expr_list
        .clone()
        .then(
            choice((
                aug_op
                    .then(expr_list.clone())
                    .map(|(op, value)| AssignTail::Augmented(op, value)),
                just(TokenKind::Equals)
                    .ignore_then(expr_list)
                    .repeated()
                    .at_least(1)
                    .map(AssignTail::Plain),
            ))
            .or_not(),
        )
        .try_map(|(first, tail), span: std::ops::Range<usize>| match tail {
            None => Ok(Statement::Expr(first)),
            Some(AssignTail::Plain(mut rest)) => {
                let value = rest
                    .pop()
                    .ok_or_else(|| Simple::custom(span.clone(), "missing assigned value"))?;
                let targets = std::iter::once(first)
                    .chain(rest)
                    .map(expr_to_target)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|message| Simple::custom(span.clone(), message))?;
                Ok(Statement::Assign { targets, value })
            }
            Some(AssignTail::Augmented(op, value)) => match expr_to_target(first) {
                Ok(Target::Tuple(_)) => Err(Simple::custom(
                    span,
                    "augmented assignment needs a single target",
                )),
                Ok(target) => Ok(Statement::AugAssign { target, op, value }),
                Err(message) => Err(Simple::custom(span, message)),
            },
        });

    choice((
        return_stmt,
        pass_stmt,
        break_stmt,
        continue_stmt,
        raise_stmt,
        import_stmt,
        from_import_stmt,
        assign_or_expr,
    ))
    .boxed()
}

fn statement_parser() -> impl Parser<TokenKind, Statement, Error = Simple<TokenKind>> + Clone {
    recursive(|stmt| {
        let expr = expr_parser().boxed();
        let simple = simple_statement_parser();

        let suite = just(TokenKind::Newline)
            .ignore_then(
                stmt.clone()
                    .repeated()
                    .at_least(1)
                    .delimited_by(just(TokenKind::Indent), just(TokenKind::Dedent)),
            )
            .or(simple.clone().then_ignore(just(TokenKind::Newline)).map(|s| vec![s]))
            .map(Block::new)
            .boxed();

        let if_stmt = just(TokenKind::If)
            .ignore_then(expr.clone())
            .then_ignore(just(TokenKind::Colon))
            .then(suite.clone())
            .then(
                just(TokenKind::Elif)
                    .ignore_then(expr.clone())
                    .then_ignore(just(TokenKind::Colon))
                    .then(suite.clone())
                    .repeated(),
            )
            .then(
                just(TokenKind::Else)
                    .ignore_then(just(TokenKind::Colon))
                    .ignore_then(suite.clone())
                    .or_not(),
            )
            .map(|(((cond, then_block), elif_blocks), else_block)| Statement::If {
                cond,
                then_block,
                elif_blocks,
                else_block,
            });

        let while_stmt = just(TokenKind::While)
            .ignore_then(expr.clone())
            .then_ignore(just(TokenKind::Colon))
            .then(suite.clone())
            .map(|(cond, body)| Statement::While { cond, body });

        let for_stmt = just(TokenKind::For)
            .ignore_then(target_list_parser())
            .then_ignore(just(TokenKind::In))
            .then(expr_list_parser(expr.clone()))
            .then_ignore(just(TokenKind::Colon))
            .then(suite.clone())
            .map(|((target, iterable), body)| Statement::For {
                target,
                iterable,
                body,
            });

        let def_stmt = just(TokenKind::Def)
            .ignore_then(identifier_parser())
            .then(
                param_list_parser(expr.clone(), true)
                    .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen)),
            )
            .then(just(TokenKind::Arrow).ignore_then(expr).or_not())
            .then_ignore(just(TokenKind::Colon))
            .then(suite)
            .map_with_span(|(((name, params), returns), body), span: std::ops::Range<usize>| {
                let (docstring, body) = split_docstring(body);
                Statement::Function(Function {
                    name,
                    params,
                    returns,
                    docstring,
                    body,
                    span: Span::from(span),
                })
            });

        choice((
            if_stmt,
            while_stmt,
            for_stmt,
            def_stmt,
            simple.then_ignore(just(TokenKind::Newline)),
        ))
        .boxed()
    })
}

fn split_docstring(mut body: Block) -> (Option<String>, Block) {
    let docstring = match body.statements.first() {
        Some(Statement::Expr(Expr::Literal(Literal::Str(text)))) => Some(text.clone()),
        _ => None,
    };
    if docstring.is_some() {
        body.statements.remove(0);
        if body.statements.is_empty() {
            body.statements.push(Statement::Pass);
        }
    }
    (docstring, body)
}

fn program_parser() -> impl Parser<TokenKind, Program, Error = Simple<TokenKind>> {
    statement_parser()
        .repeated()
        .then_ignore(just(TokenKind::Eof))
        .map(Program::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> Program {
        let tokens = tokenize(source).expect("tokenize");
        parse(&tokens).expect("parse")
    }

    #[test]
    fn fstring_fields_split_spec_and_conversion() {
        let parts = parse_fstring("x={x!r:>4} {{ok}}").expect("fstring");
        assert_eq!(parts.len(), 3);
        match &parts[1] {
            FStringPart::Expr {
                conversion, spec, ..
            } => {
                assert_eq!(*conversion, Some('r'));
                assert_eq!(spec.as_deref(), Some(">4"));
            }
            other => panic!("expected field, got {other:?}"),
        }
        assert_eq!(parts[2], FStringPart::Text(" {ok}".to_string()));
    }

    #[test]
    fn docstring_is_lifted_out_of_body() {
        let program = parse_source("def f():\n    \"\"\"Doc.\"\"\"\n    return 1\n");
        let function = program.function("f").expect("function");
        assert_eq!(function.docstring.as_deref(), Some("Doc."));
        assert_eq!(function.body.statements.len(), 1);
    }

    #[test]
    fn oversized_integer_is_rejected() {
        let tokens = tokenize("x = 99999999999999999999\n").expect("tokenize");
        assert!(parse(&tokens).is_err());
    }
}
