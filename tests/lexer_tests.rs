use conjure::lexer::{tokenize, LexerError, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .expect("tokenization should succeed")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn tokenize_simple_function() {
    let source = "def add(a, b):\n    return a + b\n";
    let expected = vec![
        TokenKind::Def,
        TokenKind::Identifier("add".to_string()),
        TokenKind::LParen,
        TokenKind::Identifier("a".to_string()),
        TokenKind::Comma,
        TokenKind::Identifier("b".to_string()),
        TokenKind::RParen,
        TokenKind::Colon,
        TokenKind::Newline,
        TokenKind::Indent,
        TokenKind::Return,
        TokenKind::Identifier("a".to_string()),
        TokenKind::Plus,
        TokenKind::Identifier("b".to_string()),
        TokenKind::Newline,
        TokenKind::Dedent,
        TokenKind::Eof,
    ];
    assert_eq!(kinds(source), expected);
}

#[test]
fn nested_blocks_close_every_indent() {
    let source = "def f(x):\n    if x:\n        return 1\n    return 2\n";
    let tokens = kinds(source);
    let indents = tokens.iter().filter(|k| **k == TokenKind::Indent).count();
    let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
    assert_eq!(indents, 2);
    assert_eq!(dedents, 2);
}

#[test]
fn comments_and_blank_lines_are_not_significant() {
    let plain = kinds("def f():\n    x = 1\n    return x\n");
    let noisy = kinds("# header\ndef f():\n\n    x = 1  # set x\n        \n    return x\n");
    assert_eq!(plain, noisy);
}

#[test]
fn numbers_keep_their_text() {
    let tokens = kinds("x = 1_000 + 2.5e3 + .5\n");
    assert!(tokens.contains(&TokenKind::Number("1_000".to_string())));
    assert!(tokens.contains(&TokenKind::Number("2.5e3".to_string())));
    assert!(tokens.contains(&TokenKind::Number(".5".to_string())));
}

#[test]
fn operators_prefer_the_longest_match() {
    let tokens = kinds("a //= b ** 2 -> c != d\n");
    assert_eq!(
        &tokens[..9],
        &[
            TokenKind::Identifier("a".to_string()),
            TokenKind::DoubleSlashEq,
            TokenKind::Identifier("b".to_string()),
            TokenKind::DoubleStar,
            TokenKind::Number("2".to_string()),
            TokenKind::Arrow,
            TokenKind::Identifier("c".to_string()),
            TokenKind::NotEq,
            TokenKind::Identifier("d".to_string()),
        ]
    );
}

#[test]
fn tabs_in_indentation_are_rejected() {
    let errors = tokenize("def f():\n\treturn 1\n").expect_err("tab indentation");
    assert!(!errors.is_empty());
}

#[test]
fn inconsistent_dedent_is_rejected() {
    let errors = tokenize("def f():\n        x = 1\n    return x\n").expect_err("bad dedent");
    assert!(!errors.is_empty());
}

#[test]
fn unterminated_strings_are_reported_with_position() {
    let errors = tokenize("x = 'abc\n").expect_err("unterminated");
    assert!(matches!(
        errors[0],
        LexerError::UnterminatedString { line: 1, .. }
    ));
}
