use basalt::config::{AnalyzerConfig, PassId};
use basalt::error::AnalyzerError;
use basalt::loader::parse_program;
use basalt::{analyze, render_output, OutputFormat};

const SMALL_PROGRAM: &str = r#"
{
  "format_version": "1.0.0",
  "entry": "Main.main",
  "classes": [
    {
      "name": "Main",
      "methods": [
        {
          "name": "main",
          "static": true,
          "vars": [
            { "name": "x", "type": "int" },
            { "name": "y", "type": "int" },
            { "name": "z", "type": "int" }
          ],
          "body": [
            { "op": "const", "var": "x", "value": 1 },
            { "op": "const", "var": "y", "value": 2 },
            { "op": "binary", "var": "z", "oper": "+", "lhs": "x", "rhs": "y" },
            { "op": "return" }
          ]
        }
      ]
    }
  ]
}
"#;

#[test]
fn loads_and_resolves_a_small_program() {
    let program = parse_program(SMALL_PROGRAM).expect("valid program");
    assert_eq!(program.classes.len(), 1);
    assert_eq!(program.methods.len(), 1);
    assert!(program.entry.is_some());
    let main = program.entry.unwrap();
    assert_eq!(program.method_name(main), "Main.main");
    assert_eq!(program.method(main).stmt_end - program.method(main).stmt_start, 4);
}

#[test]
fn analysis_over_a_loaded_program_finds_constants() {
    let program = parse_program(SMALL_PROGRAM).expect("valid program");
    let config = AnalyzerConfig::with_passes(vec![PassId::ConstProp, PassId::DeadCode]);
    let result = analyze(&program, &config).expect("analysis runs");

    let constants = result.constants.as_ref().expect("constprop ran");
    assert!(constants
        .constants
        .iter()
        .any(|c| c.var == "z" && c.value == "3"));

    // every statement is live in this program
    assert!(result.dead_code.as_ref().expect("deadcode ran").statements.is_empty());

    // both renderers accept the result
    let human = render_output(&result, OutputFormat::Human).unwrap();
    assert!(human.contains("Constants"));
    let json = render_output(&result, OutputFormat::Json).unwrap();
    assert!(json.contains("\"schema_version\""));
}

#[test]
fn future_major_versions_are_rejected() {
    let doc = SMALL_PROGRAM.replace("1.0.0", "2.0.0");
    match parse_program(&doc) {
        Err(AnalyzerError::UnsupportedVersion { version, .. }) => {
            assert_eq!(version, "2.0.0");
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn dangling_entry_is_a_resolution_error() {
    let doc = SMALL_PROGRAM.replace("Main.main", "Main.absent");
    assert!(matches!(
        parse_program(&doc),
        Err(AnalyzerError::Resolve { .. })
    ));
}

#[test]
fn unknown_variables_fail_fast() {
    let doc = SMALL_PROGRAM.replace("\"lhs\": \"x\"", "\"lhs\": \"ghost\"");
    assert!(matches!(
        parse_program(&doc),
        Err(AnalyzerError::Resolve { .. })
    ));
}

#[test]
fn unknown_types_fail_fast() {
    let doc = SMALL_PROGRAM.replace("\"type\": \"int\" }", "\"type\": \"Ghost\" }");
    assert!(matches!(
        parse_program(&doc),
        Err(AnalyzerError::Resolve { .. })
    ));
}

#[test]
fn missing_entry_method_blocks_whole_program_passes() {
    let doc = SMALL_PROGRAM.replace("  \"entry\": \"Main.main\",\n", "");
    let program = parse_program(&doc).expect("entry is optional at load time");
    let config = AnalyzerConfig::with_passes(vec![PassId::Cha]);
    assert!(matches!(
        analyze(&program, &config),
        Err(AnalyzerError::MissingEntry)
    ));
}
