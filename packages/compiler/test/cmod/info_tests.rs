//! CMOD info file tests

#[cfg(test)]
mod cmod_info_tests {
    use chtl_compiler::cmod::info::is_valid_version;
    use chtl_compiler::cmod::{CmodError, CmodInfo};

    const SAMPLE: &str = r#"
[Info] {
    name = "widgets";
    version = "1.2.3";
    description = "Reusable widgets";
    author = "someone";
    license = "MIT";
    dependencies = "base, icons";
    minVersion = "0.1.0";
    maxVersion = "2.0.0";
    homepage = "https://example.test";
}

[Export] {
    [Custom] @Style ButtonSkin, CardSkin;
    [Custom] @Element Button;
    [Template] @Var Palette;
    [Origin] @Html Banner;
    [Configuration] Defaults;
}
"#;

    mod parsing {
        use super::*;

        #[test]
        fn parses_info_fields() {
            let info = CmodInfo::parse(SAMPLE).unwrap();
            assert_eq!(info.name, "widgets");
            assert_eq!(info.version, "1.2.3");
            assert_eq!(info.author, "someone");
            assert_eq!(info.dependencies, vec!["base", "icons"]);
            assert_eq!(info.min_version, "0.1.0");
            assert_eq!(info.max_version, "2.0.0");
            assert_eq!(info.metadata.get("homepage").map(String::as_str), Some("https://example.test"));
        }

        #[test]
        fn parses_export_table_by_kind() {
            let info = CmodInfo::parse(SAMPLE).unwrap();
            assert_eq!(info.exports.custom_styles, vec!["ButtonSkin", "CardSkin"]);
            assert_eq!(info.exports.custom_elements, vec!["Button"]);
            assert_eq!(info.exports.template_vars, vec!["Palette"]);
            assert_eq!(info.exports.origins, vec!["Banner"]);
            assert_eq!(info.exports.configurations, vec!["Defaults"]);
        }

        #[test]
        fn missing_info_block_is_malformed() {
            let error = CmodInfo::parse("[Export] { }").unwrap_err();
            assert!(matches!(error, CmodError::MalformedInfo(_)));
        }

        #[test]
        fn missing_name_is_malformed() {
            let error = CmodInfo::parse("[Info] { version = \"1.0.0\"; }").unwrap_err();
            assert!(matches!(error, CmodError::MalformedInfo(_)));
        }

        #[test]
        fn bad_version_is_malformed() {
            let error =
                CmodInfo::parse("[Info] { name = \"m\"; version = \"one.two\"; }").unwrap_err();
            assert!(matches!(error, CmodError::MalformedInfo(_)));
        }
    }

    mod versions {
        use super::*;

        #[test]
        fn version_pattern_accepts_semver_with_prerelease() {
            assert!(is_valid_version("0.1.0"));
            assert!(is_valid_version("10.20.30"));
            assert!(is_valid_version("1.0.0-alpha.1"));
            assert!(!is_valid_version("1.0"));
            assert!(!is_valid_version("v1.0.0"));
            assert!(!is_valid_version("1.0.0.0"));
        }

        #[test]
        fn host_version_range_is_inclusive() {
            let info = CmodInfo::parse(SAMPLE).unwrap();
            assert!(info.accepts_host_version("0.1.0"));
            assert!(info.accepts_host_version("1.5.0"));
            assert!(info.accepts_host_version("2.0.0"));
            assert!(!info.accepts_host_version("0.0.9"));
            assert!(!info.accepts_host_version("2.0.1"));
        }

        #[test]
        fn open_bounds_accept_everything() {
            let info = CmodInfo::parse("[Info] { name = \"m\"; }").unwrap();
            assert!(info.accepts_host_version("99.0.0"));
        }
    }

    mod generation {
        use super::*;

        #[test]
        fn generated_text_reparses_to_the_same_record() {
            let info = CmodInfo::parse(SAMPLE).unwrap();
            let regenerated = CmodInfo::parse(&info.generate()).unwrap();
            assert_eq!(regenerated.name, info.name);
            assert_eq!(regenerated.version, info.version);
            assert_eq!(regenerated.dependencies, info.dependencies);
            assert_eq!(regenerated.exports, info.exports);
        }

        #[test]
        fn empty_export_table_is_omitted() {
            let info = CmodInfo::parse("[Info] { name = \"m\"; }").unwrap();
            assert!(!info.generate().contains("[Export]"));
        }
    }
}
