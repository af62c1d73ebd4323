//! CHTL-JS lexer tests

#[cfg(test)]
mod chtl_js_lexer_tests {
    use chtl_compiler::chtl_js::{LexState, Lexer, TokenKind};

    fn lex_all(source: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(source);
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

    mod operators {
        use super::*;

        #[test]
        fn selector_literal_is_one_token() {
            let tokens = lex_all("{{ .btn }}");
            assert_eq!(tokens, vec![(TokenKind::Selector, ".btn".to_string())]);
        }

        #[test]
        fn arrow_and_event_bind_are_maximal_munch() {
            let tokens = lex_all("a &-> b -> c => d");
            let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0).collect();
            assert_eq!(
                kinds,
                vec![
                    TokenKind::Identifier,
                    TokenKind::EventBind,
                    TokenKind::Identifier,
                    TokenKind::Arrow,
                    TokenKind::Identifier,
                    TokenKind::FatArrow,
                    TokenKind::Identifier,
                ]
            );
        }

        #[test]
        fn block_keywords_are_recognised() {
            let tokens = lex_all("listen delegate animate vir module load");
            let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0).collect();
            assert_eq!(kinds[..5], vec![TokenKind::Keyword; 5][..]);
            // `load` is an ordinary identifier.
            assert_eq!(kinds[5], TokenKind::Identifier);
        }

        #[test]
        fn strings_keep_quotes_and_hide_contents() {
            let tokens = lex_all("'has {{ braces }} inside'");
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].0, TokenKind::String);
            assert!(tokens[0].1.starts_with('\''));
        }

        #[test]
        fn comments_are_skipped() {
            let tokens = lex_all("a // comment -> ignored\nb /* {{x}} */ c");
            let values: Vec<&String> = tokens.iter().map(|t| &t.1).collect();
            assert_eq!(values, vec!["a", "b", "c"]);
        }
    }

    mod state_machine {
        use super::*;

        #[test]
        fn entering_listen_block_pushes_state() {
            let mut lexer = Lexer::new("listen { click: f }");
            assert_eq!(lexer.state(), LexState::Normal);
            lexer.next_token(); // listen
            lexer.next_token(); // {
            assert_eq!(lexer.state(), LexState::InListen);
        }

        #[test]
        fn closing_brace_pops_the_block_state() {
            let mut lexer = Lexer::new("animate { a: 1 } x");
            loop {
                let token = lexer.next_token();
                if token.is_punct('}') {
                    break;
                }
                assert!(!token.is_eof());
            }
            assert_eq!(lexer.state(), LexState::Normal);
        }

        #[test]
        fn nested_braces_keep_push_pop_parity() {
            let mut lexer = Lexer::new("listen { click: function() { inner(); } } after");
            let mut last = None;
            loop {
                let token = lexer.next_token();
                if token.is_eof() {
                    break;
                }
                last = Some(token);
            }
            assert_eq!(lexer.state(), LexState::Normal);
            assert_eq!(last.unwrap().value, "after");
        }

        #[test]
        fn keyword_without_brace_does_not_enter_block() {
            let mut lexer = Lexer::new("vir name = 1");
            lexer.next_token(); // vir
            lexer.next_token(); // name
            assert_eq!(lexer.state(), LexState::Normal);
        }
    }
}
