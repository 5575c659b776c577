use visual_tests::{
    build_scene, display_or_na, run_visual_test, should_update_references, update_reference,
    VisualTestConfig, VisualTestError, SCENES,
};

const THRESHOLD: f64 = 0.999;

// References are not checked in yet; bless them with
// `UPDATE_REFERENCES=1 cargo test -p visual_tests -- --ignored`.
macro_rules! visual_test {
    ($name:ident, $scene:literal) => {
        #[test]
        #[ignore = "needs blessed references"]
        fn $name() {
            let _ = env_logger::builder().is_test(true).try_init();
            let config = VisualTestConfig::new($scene).threshold(THRESHOLD);
            if should_update_references() {
                update_reference(&config).expect("failed to update reference");
                return;
            }

            let result = run_visual_test(&config).expect("visual test failed to run");

            assert!(
                result.passed,
                "'{}' changed: similarity {:.4} < {}, {} pixel(s) differ\n\
                 reference: {}\n\
                 captured:  {}\n\
                 diff:      {}",
                $scene,
                result.similarity(),
                THRESHOLD,
                result.comparison.differing_pixels,
                result.reference_path.display(),
                result.captured_path.display(),
                display_or_na(result.diff_path.as_deref()),
            );
        }
    };
}

visual_test!(test_shapes, "shapes");
visual_test!(test_nested_viewports, "nested_viewports");
visual_test!(test_popup_menu, "popup_menu");
visual_test!(test_partial_update, "partial_update");
visual_test!(test_svg_image, "svg_image");

#[test]
fn test_every_scene_builds() {
    for name in SCENES {
        assert!(build_scene(name).is_ok(), "scene '{}' failed to build", name);
    }
    assert!(build_scene("no_such_scene").is_err());
}

#[test]
fn test_scenes_render_deterministically() {
    for name in SCENES {
        let a = build_scene(name).unwrap().window().to_rgba_image();
        let b = build_scene(name).unwrap().window().to_rgba_image();
        assert!(
            visual_tests::compare(&a, &b).unwrap().is_identical(),
            "scene '{}' is not deterministic",
            name
        );
    }
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("vista-visual-{}-{}", name, std::process::id()))
}

#[test]
fn test_missing_reference_is_an_error() {
    let dir = scratch_dir("missing");
    let config = VisualTestConfig::new("shapes").reference_dir(&dir);
    match run_visual_test(&config) {
        Err(VisualTestError::ReferenceNotFound(path)) => assert_eq!(path, config.reference_path()),
        Err(err) => panic!("unexpected error: {}", err),
        Ok(_) => panic!("a scene without a reference must not pass"),
    }
    assert!(!config.reference_path().exists());
}

#[test]
fn test_blessed_reference_matches_capture() {
    let dir = scratch_dir("blessed");
    let config = VisualTestConfig::new("partial_update")
        .threshold(THRESHOLD)
        .reference_dir(&dir);
    let written = update_reference(&config).unwrap();
    assert_eq!(written, config.reference_path());

    let result = run_visual_test(&config).unwrap();
    let _ = std::fs::remove_dir_all(&dir);
    assert!(result.passed);
    assert_eq!(result.comparison.differing_pixels, 0);
    assert!(result.diff_path.is_none());
}
