//! Namespace registry tests

#[cfg(test)]
mod namespace_tests {
    use chtl_compiler::ast::{Node, NodeKind};
    use chtl_compiler::namespace::{NamespaceRegistry, SymbolKind, GLOBAL};
    use chtl_compiler::parse_util::Span;

    fn dummy_node(name: &str) -> Node {
        Node::with_value(NodeKind::Template(chtl_compiler::ast::DeclKind::Element), Span::default(), name)
    }

    mod creation {
        use super::*;

        #[test]
        fn creates_missing_ancestors() {
            let mut registry = NamespaceRegistry::new();
            let leaf = registry.create("a.b.c").unwrap();
            assert_eq!(registry.full_name(leaf), "a.b.c");
            assert!(registry.find("a").is_some());
            assert!(registry.find("a.b").is_some());
        }

        #[test]
        fn create_is_idempotent() {
            let mut registry = NamespaceRegistry::new();
            let first = registry.create("ui").unwrap();
            let second = registry.create("ui").unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn rejects_reserved_names() {
            let mut registry = NamespaceRegistry::new();
            for reserved in ["global", "default", "system", "chtl", "temp", "tmp"] {
                assert!(registry.create(reserved).is_err(), "{} should be rejected", reserved);
            }
        }

        #[test]
        fn empty_path_is_the_global_namespace() {
            let mut registry = NamespaceRegistry::new();
            assert_eq!(registry.create("").unwrap(), GLOBAL);
            assert_eq!(registry.find("").unwrap(), GLOBAL);
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn finds_by_full_path_and_short_name() {
            let mut registry = NamespaceRegistry::new();
            let widgets = registry.create("ui.widgets").unwrap();
            assert_eq!(registry.find("ui.widgets"), Some(widgets));
            // Short-name fallback does a depth-first search.
            assert_eq!(registry.find("widgets"), Some(widgets));
        }

        #[test]
        fn bare_lookup_walks_ancestors_to_global() {
            let mut registry = NamespaceRegistry::new();
            let inner = registry.create("outer.inner").unwrap();
            registry
                .register(GLOBAL, SymbolKind::Template, "Card", dummy_node("Card"), ("f".into(), 0))
                .unwrap();
            let symbol = registry.lookup(inner, SymbolKind::Template, "Card");
            assert!(symbol.is_some());
        }

        #[test]
        fn qualified_lookup_starts_at_the_given_path() {
            let mut registry = NamespaceRegistry::new();
            let ui = registry.create("ui").unwrap();
            registry
                .register(ui, SymbolKind::Custom, "Box", dummy_node("Box"), ("f".into(), 1))
                .unwrap();
            assert!(registry.lookup_qualified("ui", SymbolKind::Custom, "Box").is_some());
            assert!(registry.lookup_qualified("ui", SymbolKind::Custom, "Nope").is_none());
        }

        #[test]
        fn enter_and_exit_move_the_cursor() {
            let mut registry = NamespaceRegistry::new();
            assert_eq!(registry.current(), GLOBAL);
            let ui = registry.enter("ui").unwrap();
            assert_eq!(registry.current(), ui);
            registry.exit();
            assert_eq!(registry.current(), GLOBAL);
        }
    }

    mod registration {
        use super::*;

        #[test]
        fn same_identity_is_idempotent() {
            let mut registry = NamespaceRegistry::new();
            let identity = ("file.chtl".to_string(), 10);
            registry
                .register(GLOBAL, SymbolKind::Template, "A", dummy_node("A"), identity.clone())
                .unwrap();
            assert!(registry
                .register(GLOBAL, SymbolKind::Template, "A", dummy_node("A"), identity)
                .is_ok());
        }

        #[test]
        fn different_identity_is_a_conflict() {
            let mut registry = NamespaceRegistry::new();
            registry
                .register(GLOBAL, SymbolKind::Template, "A", dummy_node("A"), ("f".into(), 1))
                .unwrap();
            let error = registry
                .register(GLOBAL, SymbolKind::Template, "A", dummy_node("A"), ("f".into(), 99))
                .unwrap_err();
            assert!(error.message.contains("already defined"));
        }

        #[test]
        fn kinds_do_not_collide() {
            let mut registry = NamespaceRegistry::new();
            registry
                .register(GLOBAL, SymbolKind::Template, "X", dummy_node("X"), ("f".into(), 1))
                .unwrap();
            assert!(registry
                .register(GLOBAL, SymbolKind::Custom, "X", dummy_node("X"), ("f".into(), 2))
                .is_ok());
        }
    }

    mod merging {
        use super::*;

        fn registry_with_two_ui() -> NamespaceRegistry {
            let mut registry = NamespaceRegistry::new();
            let first = registry.create("a.ui").unwrap();
            let second = registry.create("b.ui").unwrap();
            registry
                .register(first, SymbolKind::Template, "One", dummy_node("One"), ("f".into(), 1))
                .unwrap();
            registry
                .register(second, SymbolKind::Template, "Two", dummy_node("Two"), ("f".into(), 2))
                .unwrap();
            registry
        }

        #[test]
        fn auto_merge_unions_same_short_name() {
            let mut registry = registry_with_two_ui();
            registry.auto_merge("ui");
            let target = registry.find("a.ui").unwrap();
            let info = registry.get(target);
            assert!(info.templates.contains_key("One"));
            assert!(info.templates.contains_key("Two"));
        }

        #[test]
        fn merge_prefers_first_registered_on_conflict() {
            let mut registry = NamespaceRegistry::new();
            let first = registry.create("a.ui").unwrap();
            let second = registry.create("b.ui").unwrap();
            registry
                .register(first, SymbolKind::Template, "X", dummy_node("X"), ("first".into(), 1))
                .unwrap();
            registry
                .register(second, SymbolKind::Template, "X", dummy_node("X"), ("second".into(), 2))
                .unwrap();
            registry.auto_merge("ui");
            let target = registry.find("a.ui").unwrap();
            let symbol = registry.get(target).templates.get("X").unwrap();
            assert_eq!(symbol.identity.0, "first");
        }

        /// For disjoint names the merged symbol set is the same union
        /// whichever namespace came first.
        #[test]
        fn merge_is_commutative_for_disjoint_names() {
            let mut forward = registry_with_two_ui();
            forward.auto_merge("ui");

            let mut reversed = NamespaceRegistry::new();
            let second = reversed.create("b.ui").unwrap();
            let first = reversed.create("a.ui").unwrap();
            reversed
                .register(second, SymbolKind::Template, "Two", dummy_node("Two"), ("f".into(), 2))
                .unwrap();
            reversed
                .register(first, SymbolKind::Template, "One", dummy_node("One"), ("f".into(), 1))
                .unwrap();
            reversed.auto_merge("ui");

            let forward_target = forward.find("ui").unwrap();
            let reversed_target = reversed.find("ui").unwrap();
            let mut forward_keys: Vec<&String> =
                forward.get(forward_target).templates.keys().collect();
            let mut reversed_keys: Vec<&String> =
                reversed.get(reversed_target).templates.keys().collect();
            forward_keys.sort();
            reversed_keys.sort();
            assert_eq!(forward_keys, reversed_keys);
        }

        #[test]
        fn merging_reserved_names_warns_instead_of_failing() {
            let mut registry = NamespaceRegistry::new();
            let diagnostics = registry.auto_merge("global");
            assert_eq!(diagnostics.len(), 1);
        }
    }

    mod default_namespace {
        use super::*;

        #[test]
        fn derives_from_base_filename() {
            assert_eq!(
                NamespaceRegistry::default_namespace_for("src/pages/home.chtl"),
                "home"
            );
            assert_eq!(NamespaceRegistry::default_namespace_for("plain"), "plain");
        }
    }
}
