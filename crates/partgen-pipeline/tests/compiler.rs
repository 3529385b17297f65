use partgen_pipeline::compiler::locate_with;
use partgen_pipeline::{CompileError, ScadCompiler};
use std::path::{Path, PathBuf};

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("partgen-compiler-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn touch(path: &Path) {
    std::fs::write(path, b"").expect("touch");
}

#[test]
fn explicit_path_wins_and_is_authoritative() {
    let dir = scratch("explicit");
    let binary = dir.join("my-openscad");
    touch(&binary);

    let found = locate_with(Some(&binary), None, None, &[]).expect("explicit");
    assert_eq!(binary, found);
    let compiler = ScadCompiler::locate(Some(&binary)).expect("explicit");
    assert_eq!(binary.as_path(), compiler.program());

    let missing = dir.join("nope");
    let on_path = dir.join("openscad");
    touch(&on_path);
    match locate_with(Some(&missing), None, Some(dir.clone().into_os_string()), &[]) {
        Err(CompileError::NotFound { searched }) => assert_eq!(vec![missing], searched),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[cfg(not(windows))]
#[test]
fn env_then_path_then_fallbacks() {
    let dir = scratch("order");
    let env_bin = dir.join("from-env");
    let path_dir = dir.join("bin");
    std::fs::create_dir_all(&path_dir).expect("mkdir");
    let path_bin = path_dir.join("openscad");
    let fallback = dir.join("fallback-openscad");
    touch(&path_bin);
    touch(&fallback);

    let path_var = Some(path_dir.clone().into_os_string());

    // Unset env var: PATH is next.
    assert_eq!(
        path_bin,
        locate_with(None, None, path_var.clone(), &[fallback.clone()]).expect("path")
    );

    touch(&env_bin);
    assert_eq!(
        env_bin,
        locate_with(None, Some(env_bin.clone().into_os_string()), path_var, &[]).expect("env")
    );

    assert_eq!(
        fallback,
        locate_with(None, None, Some(dir.join("empty").into_os_string()), &[fallback.clone()])
            .expect("fallback")
    );
}

#[test]
fn not_found_lists_every_place_searched() {
    let dir = scratch("missing");
    let fallback = dir.join("not-installed");
    let err = locate_with(None, Some(dir.join("env-bin").into_os_string()), None, &[fallback.clone()])
        .expect_err("nothing exists");
    match &err {
        CompileError::NotFound { searched } => {
            assert_eq!(vec![dir.join("env-bin"), fallback], *searched)
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("env-bin"), "{message}");
    assert!(message.contains("OPENSCAD"), "{message}");
}

#[cfg(unix)]
mod fake_openscad {
    use super::scratch;
    use partgen_pipeline::{CompileError, ScadCompiler};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    // One test so the scripts are never written while another thread forks.
    #[test]
    fn compile_outcomes() {
        let dir = scratch("fake");
        let scad = dir.join("model.scad");
        std::fs::write(&scad, "cube([1, 1, 1]);\n").expect("write scad");
        let mesh = dir.join("output.stl");

        let ok = script(
            &dir,
            "ok",
            r#"[ "$1" = "-o" ] || exit 9
printf 'solid fake\nendsolid fake\n' > "$2""#,
        );
        ScadCompiler::new(&ok).compile(&scad, &mesh).expect("compiles");
        assert!(std::fs::read_to_string(&mesh)
            .expect("mesh")
            .starts_with("solid fake"));

        let failing = script(
            &dir,
            "failing",
            "echo 'ERROR: Parser error in line 3' >&2\nexit 1",
        );
        match ScadCompiler::new(&failing).compile(&scad, &mesh) {
            Err(CompileError::Failed { status, stderr }) => {
                assert_eq!(Some(1), status.code());
                assert_eq!("ERROR: Parser error in line 3", stderr);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!mesh.exists(), "stale mesh must be cleared");

        let silent = script(&dir, "silent", "exit 0");
        assert!(matches!(
            ScadCompiler::new(&silent).compile(&scad, &mesh),
            Err(CompileError::MissingOutput { .. })
        ));

        assert!(matches!(
            ScadCompiler::new(dir.join("absent")).compile(&scad, &mesh),
            Err(CompileError::Spawn { .. })
        ));
    }
}
