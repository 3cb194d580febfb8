//! Integration tests for argv parsing against private registries.

use cmdflags::{
    CommandLineFlag, CommandLineFlagParser, FlagError, FlagRegistry, FlagSettingMode, FlagValue,
    Validator, parse_flags_with_registry,
};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|arg| arg.to_string()).collect()
}

fn registry() -> FlagRegistry {
    let registry = FlagRegistry::with_directive_flags();
    registry.register_flag(CommandLineFlag::new(
        "a",
        "an integer",
        "tests/command_line_parsing.rs",
        FlagValue::Int32(1),
        FlagValue::Int32(1),
    ));
    registry.register_flag(CommandLineFlag::new(
        "b",
        "a string",
        "tests/command_line_parsing.rs",
        FlagValue::String(String::new()),
        FlagValue::String(String::new()),
    ));
    registry.register_flag(CommandLineFlag::new(
        "fast",
        "go fast",
        "tests/command_line_parsing.rs",
        FlagValue::Bool(false),
        FlagValue::Bool(false),
    ));
    registry.register_flag(CommandLineFlag::new(
        "big",
        "an unsigned 64-bit integer",
        "tests/command_line_parsing.rs",
        FlagValue::Uint64(0),
        FlagValue::Uint64(0),
    ));
    registry
}

fn value(registry: &FlagRegistry, name: &str) -> String {
    registry.lock().current_value_locked(name).unwrap()
}

fn reject_all(_: &str, _: i32) -> bool {
    false
}

#[test]
fn test_remove_flags_keeps_positionals_in_order() {
    let registry = registry();
    let mut argv = args(&["prog", "--a=5", "pos1", "--b=x", "pos2"]);

    let remaining = parse_flags_with_registry(&registry, &mut argv, true).unwrap();

    assert_eq!(argv, ["prog", "pos1", "pos2"]);
    assert_eq!(remaining, 3);
    assert_eq!(value(&registry, "a"), "5");
    assert_eq!(value(&registry, "b"), "x");
}

#[test]
fn test_keep_flags_returns_boundary() {
    let registry = registry();
    let mut argv = args(&["prog", "pos1", "--a=5", "-", "--fast"]);

    let boundary = parse_flags_with_registry(&registry, &mut argv, false).unwrap();

    assert_eq!(boundary, 3);
    assert_eq!(argv, ["prog", "--a=5", "--fast", "pos1", "-"]);
}

#[test]
fn test_illegal_value_keeps_previous() {
    let registry = registry();
    let mut argv = args(&["prog", "--a=999999999999"]);

    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();

    assert_eq!(error.errors().len(), 1);
    assert!(matches!(*error.errors()[0].1, FlagError::IllegalValue { .. }));
    assert_eq!(
        error.message(),
        "ERROR: illegal value '999999999999' specified for int32 flag 'a'\n"
    );
    assert_eq!(value(&registry, "a"), "1");
}

#[test]
fn test_unsigned_rejects_negative() {
    let registry = registry();
    let mut argv = args(&["prog", "--big= -1"]);
    assert!(parse_flags_with_registry(&registry, &mut argv, false).is_err());

    let mut argv = args(&["prog", "--big=0xFFFFFFFFFFFFFFFF"]);
    parse_flags_with_registry(&registry, &mut argv, false).unwrap();
    assert_eq!(value(&registry, "big"), u64::MAX.to_string());
}

#[test]
fn test_negated_bool_matches_explicit_zero() {
    let first = registry();
    let mut argv = args(&["prog", "--fast", "--nofast"]);
    parse_flags_with_registry(&first, &mut argv, false).unwrap();

    let second = registry();
    let mut argv = args(&["prog", "--fast", "--fast=0"]);
    parse_flags_with_registry(&second, &mut argv, false).unwrap();

    assert_eq!(value(&first, "fast"), "false");
    assert_eq!(value(&first, "fast"), value(&second, "fast"));
    assert!(first.lock().find_flag_locked("fast").unwrap().is_modified());
}

#[test]
fn test_negated_non_bool_is_an_error() {
    let registry = registry();
    let mut argv = args(&["prog", "--noa"]);

    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();

    assert_eq!(
        error.message(),
        "ERROR: boolean value (noa) specified for int32 command line flag\n"
    );
}

#[test]
fn test_bool_spellings_from_argv() {
    for (text, expected) in [
        ("1", "true"),
        ("T", "true"),
        ("yes", "true"),
        ("Y", "true"),
        ("TRUE", "true"),
        ("0", "false"),
        ("f", "false"),
        ("No", "false"),
        ("n", "false"),
        ("False", "false"),
    ] {
        let registry = registry();
        let mut argv = args(&["prog", &format!("--fast={text}")]);
        parse_flags_with_registry(&registry, &mut argv, false).unwrap();
        assert_eq!(value(&registry, "fast"), expected, "{text}");
    }

    let registry = registry();
    let mut argv = args(&["prog", "--fast=maybe"]);
    assert!(parse_flags_with_registry(&registry, &mut argv, false).is_err());
}

#[test]
fn test_validator_rejecting_everything() {
    let registry = registry();
    let ptr = registry.lock().find_flag_locked("a").unwrap().flag_ptr();
    assert!(registry.add_flag_validator(ptr, Some(Validator::Int32(reject_all))));

    let mut argv = args(&["prog", "--a=5"]);
    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();
    assert_eq!(error.flag_names().collect::<Vec<_>>(), ["a"]);
    assert!(matches!(*error.errors()[0].1, FlagError::FailedValidation { .. }));
    assert_eq!(value(&registry, "a"), "1");

    let mut argv = args(&["prog"]);
    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();
    assert_eq!(
        error.message(),
        "ERROR: --a must be set on the commandline (default value fails validation)\n"
    );
}

#[test]
fn test_undefok_tolerates_unknown_flag() {
    let registry = registry();
    let mut argv = args(&["prog", "--undefok=x", "--x=1"]);

    assert!(parse_flags_with_registry(&registry, &mut argv, false).is_ok());
    assert!(registry.lock().find_flag_locked("x").is_none());
}

#[test]
fn test_undefok_does_not_cover_other_names() {
    let registry = registry();
    let mut argv = args(&["prog", "--undefok=x", "--y=1"]);

    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();
    assert_eq!(error.message(), "ERROR: unknown command line flag 'y'\n");
}

#[test]
fn test_undefok_list_with_trailing_comma() {
    let registry = registry();
    let mut argv = args(&["prog", "--undefok=x,", "--x=1", "--a=3"]);

    assert!(parse_flags_with_registry(&registry, &mut argv, false).is_ok());
    assert_eq!(value(&registry, "a"), "3");
}

#[test]
fn test_missing_argument_includes_help() {
    let registry = registry();
    let mut argv = args(&["prog", "--b=1", "--a"]);

    let error = parse_flags_with_registry(&registry, &mut argv, false).unwrap_err();

    assert_eq!(
        error.message(),
        "ERROR: flag '--a' is missing its argument; flag description: an integer\n"
    );
    assert_eq!(value(&registry, "b"), "1");
}

#[test]
fn test_errors_accumulate_within_one_parser() {
    let registry = registry();
    let mut parser = CommandLineFlagParser::new(&registry);

    let mut argv = args(&["prog", "--first_unknown"]);
    parser.parse_new_command_line_flags(&mut argv, false);
    let mut argv = args(&["prog", "--second_unknown", "--a=2"]);
    parser.parse_new_command_line_flags(&mut argv, false);

    let error = parser.report_errors().unwrap_err();
    assert_eq!(
        error.flag_names().collect::<Vec<_>>(),
        ["first_unknown", "second_unknown"]
    );
    assert_eq!(value(&registry, "a"), "2");
}

#[test]
fn test_set_if_default_applies_once() {
    let registry = registry();
    let mut flags = registry.lock();

    let first = flags
        .set_flag_locked("a", "10", FlagSettingMode::SetFlagIfDefault)
        .unwrap();
    let second = flags
        .set_flag_locked("a", "20", FlagSettingMode::SetFlagIfDefault)
        .unwrap();

    assert_eq!(first, "a set to 10\n");
    assert_eq!(second, "a set to 10");
    assert_eq!(flags.current_value_locked("a").as_deref(), Some("10"));
}

#[test]
fn test_set_default_mode_through_parser() {
    let registry = registry();
    let mut parser = CommandLineFlagParser::new(&registry);

    let message = parser.process_single_option("b", "fallback", FlagSettingMode::SetFlagsDefault);
    assert_eq!(message, "b set to fallback\n");

    let info = registry.flag_info("b").unwrap();
    assert_eq!(info.default_value, "fallback");
    assert_eq!(info.current_value, "fallback");
    assert!(info.is_default);
}
