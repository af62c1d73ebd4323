//! CHTL lexer tests

#[cfg(test)]
mod chtl_lexer_tests {
    use chtl_compiler::chtl::{Lexer, LexerConfig, LexerState, TokenKind};

    fn lex_kinds(source: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(source, LexerConfig::default());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.is_eof() {
                break;
            }
            tokens.push((token.kind, token.value));
        }
        tokens
    }

    mod basic_tokens {
        use super::*;

        #[test]
        fn should_lex_element_header() {
            let tokens = lex_kinds("div { id: box; }");
            assert_eq!(
                tokens,
                vec![
                    (TokenKind::Identifier, "div".to_string()),
                    (TokenKind::Punctuation, "{".to_string()),
                    (TokenKind::Identifier, "id".to_string()),
                    (TokenKind::Punctuation, ":".to_string()),
                    (TokenKind::Identifier, "box".to_string()),
                    (TokenKind::Punctuation, ";".to_string()),
                    (TokenKind::Punctuation, "}".to_string()),
                ]
            );
        }

        #[test]
        fn should_lex_string_without_quotes_in_value() {
            let tokens = lex_kinds("\"hello\"");
            assert_eq!(tokens, vec![(TokenKind::String, "hello".to_string())]);
        }

        #[test]
        fn should_lex_escape_sequences() {
            let tokens = lex_kinds(r#""a\nb""#);
            assert_eq!(tokens[0].1, "a\nb");
        }

        #[test]
        fn should_lex_numbers_and_dimensions() {
            let tokens = lex_kinds("42 1.5em 100%");
            assert_eq!(
                tokens,
                vec![
                    (TokenKind::Number, "42".to_string()),
                    (TokenKind::UnquotedLiteral, "1.5em".to_string()),
                    (TokenKind::UnquotedLiteral, "100%".to_string()),
                ]
            );
        }

        #[test]
        fn should_lex_bracket_keywords_as_single_tokens() {
            let tokens = lex_kinds("[Template] [Custom] [Origin]");
            assert_eq!(
                tokens,
                vec![
                    (TokenKind::Keyword, "[Template]".to_string()),
                    (TokenKind::Keyword, "[Custom]".to_string()),
                    (TokenKind::Keyword, "[Origin]".to_string()),
                ]
            );
        }

        #[test]
        fn should_lex_word_keywords() {
            let tokens = lex_kinds("style script text delete inherit except from");
            assert!(tokens.iter().all(|(kind, _)| *kind == TokenKind::Keyword));
        }

        #[test]
        fn dashed_identifiers_stay_single_tokens() {
            let tokens = lex_kinds("font-family: sans-serif;");
            assert_eq!(tokens[0], (TokenKind::Identifier, "font-family".to_string()));
            assert_eq!(tokens[2], (TokenKind::Identifier, "sans-serif".to_string()));
        }
    }

    mod comments {
        use super::*;

        #[test]
        fn line_comments_are_tokens_by_default() {
            let tokens = lex_kinds("// note\ndiv");
            assert_eq!(tokens[0], (TokenKind::CommentLine, "note".to_string()));
        }

        #[test]
        fn generator_comments_keep_their_text() {
            let tokens = lex_kinds("-- preserved text\ndiv");
            assert_eq!(
                tokens[0],
                (TokenKind::CommentGenerator, "preserved text".to_string())
            );
        }

        #[test]
        fn block_comments_can_be_skipped() {
            let config = LexerConfig { skip_comments: true, ..LexerConfig::default() };
            let mut lexer = Lexer::new("/* gone */ div", config);
            let token = lexer.next_token();
            assert_eq!(token.kind, TokenKind::Identifier);
            assert_eq!(token.value, "div");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn unterminated_string_records_error_with_state() {
            let mut lexer = Lexer::new("\"never closed", LexerConfig::default());
            let token = lexer.next_token();
            assert_eq!(token.kind, TokenKind::Invalid);
            let errors = lexer.errors();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].state, LexerState::InString);
            assert!(errors[0].message.contains("unterminated"));
        }

        #[test]
        fn invalid_character_is_not_swallowed() {
            let mut lexer = Lexer::new("div \u{1F980} span", LexerConfig::default());
            let mut kinds = Vec::new();
            loop {
                let token = lexer.next_token();
                if token.is_eof() {
                    break;
                }
                kinds.push(token.kind);
            }
            assert!(kinds.contains(&TokenKind::Invalid));
            assert_eq!(lexer.errors().len(), 1);
        }
    }

    mod limits {
        use super::*;

        #[test]
        fn max_tokens_bounds_the_stream() {
            let config = LexerConfig { max_tokens: 3, ..LexerConfig::default() };
            let mut lexer = Lexer::new("a b c d e f", config);
            let mut count = 0;
            loop {
                let token = lexer.next_token();
                if token.is_eof() {
                    break;
                }
                count += 1;
            }
            assert_eq!(count, 3);
        }

        #[test]
        fn positions_are_tracked_across_lines() {
            let mut lexer = Lexer::new("a\n  b", LexerConfig::default());
            let a = lexer.next_token();
            let b = lexer.next_token();
            assert_eq!(a.span.start.line, 0);
            assert_eq!(b.span.start.line, 1);
            assert_eq!(b.span.start.col, 2);
        }
    }

    mod raw_blocks {
        use super::*;

        #[test]
        fn raw_capture_balances_nested_braces() {
            let mut lexer = Lexer::new("{ if (x) { y(); } }", LexerConfig::default());
            let open = lexer.next_token();
            assert!(open.is_punct('{'));
            let (body, _) = lexer.capture_raw_block().unwrap();
            assert_eq!(body.trim(), "if (x) { y(); }");
        }

        #[test]
        fn raw_capture_ignores_braces_in_strings() {
            let mut lexer = Lexer::new("{ var s = \"}\"; }", LexerConfig::default());
            lexer.next_token();
            let (body, _) = lexer.capture_raw_block().unwrap();
            assert_eq!(body.trim(), "var s = \"}\";");
        }
    }
}
