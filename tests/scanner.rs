#[cfg(test)]
mod scanner_tests {
    use fen::diagnostics::Reporter;
    use fen::scanner::Scanner;
    use fen::token::{Token, TokenType};

    fn scan(source: &str) -> (Vec<Token>, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        (tokens, reporter)
    }

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let (tokens, reporter) = scan(source);

        assert!(!reporter.had_error, "unexpected lex error in {:?}", source);
        assert_eq!(tokens.len(), expected.len(), "token count for {:?}", source);

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn ternary_punctuation() {
        assert_token_sequence(
            "a ? b : c",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::QUESTION, "?"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::COLON, ":"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn two_character_operators() {
        assert_token_sequence(
            "! != = == > >= < <=",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_token_sequence(
            "var breaker = break and whileX while",
            &[
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "breaker"),
                (TokenType::EQUAL, "="),
                (TokenType::BREAK, "break"),
                (TokenType::AND, "and"),
                (TokenType::IDENTIFIER, "whileX"),
                (TokenType::WHILE, "while"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn number_literals_carry_values() {
        let (tokens, reporter) = scan("123 3.14");

        assert!(!reporter.had_error);
        assert_eq!(tokens.len(), 3);

        match tokens[0].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 123.0),
            _ => panic!("expected NUMBER, got {:?}", tokens[0].token_type),
        }
        match tokens[1].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 3.14),
            _ => panic!("expected NUMBER, got {:?}", tokens[1].token_type),
        }
    }

    #[test]
    fn string_literal_strips_quotes() {
        let (tokens, reporter) = scan("\"hello fen\"");

        assert!(!reporter.had_error);
        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "hello fen"),
            other => panic!("expected STRING, got {:?}", other),
        }
    }

    #[test]
    fn multiline_string_advances_line_counter() {
        let (tokens, reporter) = scan("\"one\ntwo\"\nident");

        assert!(!reporter.had_error);
        // The string token reports the line scanning ended on.
        assert_eq!(tokens[0].line, 2);
        // `ident` sits on line 3.
        assert_eq!(tokens[1].lexeme, "ident");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_token_sequence(
            "1 // the rest is gone\n2",
            &[
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn nested_block_comments_are_skipped() {
        assert_token_sequence(
            "before /* outer /* inner */ still outer */ after",
            &[
                (TokenType::IDENTIFIER, "before"),
                (TokenType::IDENTIFIER, "after"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn block_comment_newlines_count() {
        let (tokens, reporter) = scan("/* line1\nline2\nline3 */ x");

        assert!(!reporter.had_error);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn unterminated_block_comment_reports_and_terminates() {
        let (tokens, reporter) = scan("ok /* never closed");

        assert!(reporter.had_error);
        assert_eq!(tokens[0].lexeme, "ok");
        assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
    }

    #[test]
    fn unterminated_string_reports_and_terminates() {
        let (tokens, reporter) = scan("\"dangling");

        assert!(reporter.had_error);
        // Only EOF: the bad literal produced no token.
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::EOF);
    }

    #[test]
    fn unexpected_characters_do_not_stop_the_scan() {
        let (tokens, reporter) = scan(",.$(#");

        assert!(reporter.had_error);

        // The two bad bytes are skipped; everything else still comes through.
        let kinds: Vec<&str> = tokens.iter().map(|t| t.token_type.name()).collect();
        assert_eq!(kinds, vec!["COMMA", "DOT", "LEFT_PAREN", "EOF"]);
    }

    #[test]
    fn eof_is_always_last_and_unique() {
        for source in ["", "   ", "// just a comment", "1 + 2"] {
            let (tokens, _) = scan(source);

            let eof_count = tokens
                .iter()
                .filter(|t| t.token_type == TokenType::EOF)
                .count();
            assert_eq!(eof_count, 1, "source {:?}", source);
            assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
        }
    }
}
