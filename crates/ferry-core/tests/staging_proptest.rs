use std::collections::BTreeMap;
use std::path::PathBuf;

use ferry_core::aggregate::{MergePolicy, SourceAggregator};
use ferry_core::fs::list_files;
use ferry_core::manifest::build_package_manifest;
use ferry_core::project::ModuleDescriptor;
use ferry_core::staging::StagingArea;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn manifest_members_are_wildcard_or_given_names(
        names in prop::collection::vec("[A-Za-z_][A-Za-z0-9_]{0,10}", 0..6)
    ) {
        let manifest = build_package_manifest("PermissionSet", &names, "58.0");
        let xml = manifest.to_xml();

        if names.is_empty() {
            prop_assert_eq!(manifest.member_names(), vec!["*"]);
            prop_assert_eq!(xml.matches("<members>").count(), 1);
        } else {
            let expected: Vec<&str> = names.iter().map(String::as_str).collect();
            prop_assert_eq!(manifest.member_names(), expected);
            prop_assert_eq!(xml.matches("<members>").count(), names.len());
        }
        prop_assert!(xml.contains("<name>PermissionSet</name>"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn merged_modules_keep_the_last_writer(
        modules in prop::collection::vec(
            prop::collection::btree_map(0u8..5, any::<u16>(), 0..4),
            1..4,
        )
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        let mut descriptors = Vec::new();
        let mut expected: BTreeMap<PathBuf, String> = BTreeMap::new();

        for (index, files) in modules.iter().enumerate() {
            let module = format!("m{index}");
            let default_dir = project.join(&module).join("main/default/classes");
            std::fs::create_dir_all(&default_dir).unwrap();
            for (file, value) in files {
                let content = format!("{module}:{value}");
                std::fs::write(default_dir.join(format!("C{file}.cls")), &content).unwrap();
                expected.insert(PathBuf::from(format!("classes/C{file}.cls")), content);
            }
            descriptors.push(ModuleDescriptor { path: module });
        }

        let staging = StagingArea::create(tmp.path()).unwrap();
        SourceAggregator::new(project, MergePolicy::LastWriteWins)
            .stage_modules(&staging, &descriptors)
            .unwrap();

        let staged = list_files(&staging.default_dir()).unwrap();
        prop_assert_eq!(&staged, &expected.keys().cloned().collect::<Vec<_>>());
        for (relative, content) in &expected {
            let actual = std::fs::read_to_string(staging.default_dir().join(relative)).unwrap();
            prop_assert_eq!(&actual, content);
        }
    }
}
