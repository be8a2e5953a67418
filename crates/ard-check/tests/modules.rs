//! Checking programs that import modules from disk.

use ard_ast::SourceMap;
use ard_check::{CheckOutput, DiagnosticKind, FsModuleResolver, check};
use std::path::Path;

fn check_main(root: &Path, source: &str) -> (CheckOutput, SourceMap) {
    let mut sources = SourceMap::new();
    let file_id = sources.add_file(root.join("main.ard"), source.to_string());
    let program = ard_parser::parse_program(source, file_id).unwrap();
    let output = {
        let mut resolver = FsModuleResolver::new(root, &mut sources);
        check(&program, &mut resolver)
    };
    (output, sources)
}

fn rendered(output: &CheckOutput, sources: &SourceMap) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .map(|d| d.render(sources))
        .collect()
}

#[test]
fn imported_functions_join_the_program() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("math")).unwrap();
    std::fs::write(
        dir.path().join("math/ops.ard"),
        "fn square(x: Int) Int { x * x }\nfn cube(x: Int) Int { x * square(x) }\n",
    )
    .unwrap();

    let (output, sources) = check_main(dir.path(), "use app/math/ops\nops::cube(3)\n");
    assert!(!output.has_errors(), "{:?}", rendered(&output, &sources));
    let names: Vec<&str> = output
        .program
        .functions
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert!(names.iter().any(|n| n.ends_with("cube")), "{names:?}");
    assert!(names.iter().any(|n| n.ends_with("square")), "{names:?}");
}

#[test]
fn errors_inside_modules_render_with_the_module_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("util.ard"), "fn broken() Int { \"nope\" }\n").unwrap();

    let (output, sources) = check_main(dir.path(), "use app/util\nutil::broken()\n");
    let errors: Vec<String> = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Error)
        .map(|d| d.render(&sources))
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("util.ard:1:"), "{}", errors[0]);
}

#[test]
fn missing_module_is_an_error_at_the_import() {
    let dir = tempfile::tempdir().unwrap();
    let (output, sources) = check_main(dir.path(), "use app/gone\n1\n");
    let lines = rendered(&output, &sources);
    assert!(output.has_errors());
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("main.ard:1:"), "{}", lines[0]);
    assert!(lines[0].contains("not found"), "{}", lines[0]);
}

#[test]
fn module_with_syntax_errors_notes_each_one() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.ard"), "fn (\n").unwrap();

    let (output, _) = check_main(dir.path(), "use app/bad\n1\n");
    assert!(output.has_errors());
    let diagnostic = &output.diagnostics[0];
    assert!(diagnostic.message.contains("syntax error"), "{}", diagnostic.message);
    assert!(!diagnostic.notes.is_empty());
}
