//! Canonical IDs in built artifacts.

use kiln_common::{create_canonical_id, parse_canonical_id};
use kiln_conformance::{document, element_ids, TestProject, GQL_IMPORT};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,8}".prop_map(|s| format!("q_{s}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn artifact_ids_round_trip(
        dir in "[a-z]{1,6}",
        names in proptest::collection::btree_set(ident(), 1..4),
    ) {
        let mut source = GQL_IMPORT.to_string();
        for name in &names {
            source.push_str(&format!(
                "export const {name} = gql.fragment(\"User\", {{ fields: [\"id\"] }});\n"
            ));
        }
        let rel = format!("{dir}/defs.ts");
        let project = TestProject::new(&[(rel.as_str(), source.as_str())], "");
        let artifact = project.build().unwrap();

        prop_assert_eq!(artifact.elements.len(), names.len());
        let file = format!("src/{rel}");
        for (id, name) in artifact.elements.keys().zip(&names) {
            let parsed = parse_canonical_id(id.as_str()).unwrap();
            prop_assert_eq!(parsed.file_path(), file.as_str());
            prop_assert_eq!(parsed.in_file_path(), name.as_str());
        }
    }
}

#[test]
fn ids_are_relative_to_the_base_dir() {
    let source = format!("{GQL_IMPORT}export const user = gql.fragment(\"User\", {{ fields: [\"id\"] }});\n");
    let project = TestProject::new(&[("nested/user.ts", &source)], "");
    let artifact = project.build().unwrap();

    let root = kiln_common::normalize_path(&project.path().to_string_lossy());
    let expected = create_canonical_id(&format!("{root}/src/nested/user.ts"), "user", Some(&root)).unwrap();
    assert!(artifact.elements.contains_key(&expected));
    assert_eq!(expected.as_str(), "src/nested/user.ts::user");
}

#[test]
fn definitions_inside_functions_keep_their_scope_path() {
    let source = format!(
        "{GQL_IMPORT}export const factory = () => {{\n  const baseQuery = gql.operation(\"query\", \"Base\", {{ fields: [\"id\"] }});\n  return baseQuery;\n}};\n"
    );
    let project = TestProject::new(&[("factory.ts", &source)], "");
    let artifact = project.build().unwrap();
    assert_eq!(element_ids(&artifact), vec!["src/factory.ts::factory.arrow#0.baseQuery"]);
    assert!(document(&artifact, "Base").unwrap().starts_with("query Base"));
    assert!(artifact.report.warnings.is_empty());
}
