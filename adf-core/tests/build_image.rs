//! End-to-end builds of real ADF images.

use std::fs;
use std::path::Path;

use adf_core::{
    build_image, AdfError, AdfVolume, BootBlock, BootMode, BuildRequest, DumpDevice, EntryKind,
    Geometry, SourceFit, VolumeFS,
};
use tempfile::TempDir;

fn mount(path: &Path) -> AdfVolume {
    AdfVolume::mount(DumpDevice::open(path).expect("image readable")).expect("image mounts")
}

#[test]
fn test_single_file_with_label() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("a.txt");
    fs::write(&input, "hello").unwrap();
    let out = temp.path().join("test.adf");

    let mut req = BuildRequest::new(&out);
    req.label = "TEST".to_string();
    req.inputs = vec![input];
    let report = build_image(&req).unwrap();

    assert_eq!(fs::metadata(&out).unwrap().len(), 901_120);
    assert_eq!(report.files, vec!["a.txt"]);
    assert_eq!(report.free_blocks, Some(1754));

    let vol = mount(&out);
    assert_eq!(vol.label(), "TEST");
    assert_eq!(vol.read_file(&vol.root(), "a.txt").unwrap(), b"hello");
    assert!(vol.boot_block().is_none());
}

#[test]
fn test_recursive_directory() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(docs.join("sub")).unwrap();
    let payload: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
    fs::write(docs.join("sub/x.bin"), &payload).unwrap();
    let out = temp.path().join("docs.adf");

    let mut req = BuildRequest::new(&out);
    req.recursive = true;
    req.inputs = vec![docs];
    let report = build_image(&req).unwrap();
    assert_eq!(report.dirs, vec!["docs", "docs/sub"]);
    assert_eq!(report.files, vec!["docs/sub/x.bin"]);

    let vol = mount(&out);
    let root = vol.root();
    let root_entries = vol.list_dir(&root).unwrap();
    assert_eq!(root_entries.len(), 1);
    assert_eq!(root_entries[0].name, "docs");
    assert_eq!(root_entries[0].kind, EntryKind::Dir);

    let docs = vol.open_dir(&root, "docs").unwrap();
    let sub = vol.open_dir(&docs, "sub").unwrap();
    assert_eq!(vol.read_file(&sub, "x.bin").unwrap(), payload);
}

#[test]
fn test_directory_skipped_without_recursion() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("x"), "x").unwrap();
    let out = temp.path().join("skip.adf");

    let mut req = BuildRequest::new(&out);
    req.inputs = vec![docs.clone()];
    let report = build_image(&req).unwrap();

    assert_eq!(report.skipped, vec![docs]);
    let vol = mount(&out);
    assert!(vol.list_dir(&vol.root()).unwrap().is_empty());
}

#[test]
fn test_minimal_boot_block_installed() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("boot.adf");

    let mut req = BuildRequest::new(&out);
    req.boot = BootMode::Minimal;
    build_image(&req).unwrap();

    let raw = fs::read(&out).unwrap();
    assert_eq!(&raw[..4], b"DOS\0");
    assert_eq!(&raw[8..12], &880u32.to_be_bytes());
    assert_eq!(&raw[12..1024], &BootBlock::minimal().as_bytes()[12..]);
}

#[test]
fn test_oversized_boot_file_truncated() {
    let temp = TempDir::new().unwrap();
    let boot = temp.path().join("boot.bin");
    let code: Vec<u8> = (0..1500u32).map(|i| (i % 200) as u8 + 1).collect();
    fs::write(&boot, &code).unwrap();
    let out = temp.path().join("big-boot.adf");

    let mut req = BuildRequest::new(&out);
    req.boot = BootMode::File { path: boot };
    let report = build_image(&req).unwrap();
    assert_eq!(report.boot, Some(SourceFit::Truncated(1500)));

    let raw = fs::read(&out).unwrap();
    assert_eq!(&raw[12..1024], &code[12..1024]);
    // Root block untouched by the boot code
    let vol = mount(&out);
    assert_eq!(vol.label(), "empty");
}

#[test]
fn test_short_boot_file_padded() {
    let temp = TempDir::new().unwrap();
    let boot = temp.path().join("boot.bin");
    fs::write(&boot, [0xAAu8; 100]).unwrap();
    let out = temp.path().join("short-boot.adf");

    let mut req = BuildRequest::new(&out);
    req.boot = BootMode::File { path: boot };
    let report = build_image(&req).unwrap();
    assert_eq!(report.boot, Some(SourceFit::Padded(100)));

    let raw = fs::read(&out).unwrap();
    assert!(raw[12..100].iter().all(|&b| b == 0xAA));
    assert!(raw[100..1024].iter().all(|&b| b == 0));
}

#[test]
fn test_mixed_inputs_in_order() {
    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("tree");
    fs::create_dir_all(tree.join("a/b")).unwrap();
    fs::write(tree.join("a/b/deep.txt"), "deep").unwrap();
    fs::write(tree.join("top.txt"), "top").unwrap();
    let single = temp.path().join("single.bin");
    fs::write(&single, [1u8, 2, 3]).unwrap();
    let out = temp.path().join("mixed.adf");

    let mut req = BuildRequest::new(&out);
    req.recursive = true;
    req.inputs = vec![tree, single];
    let report = build_image(&req).unwrap();
    assert_eq!(
        report.files,
        vec!["tree/a/b/deep.txt", "tree/top.txt", "single.bin"]
    );
    assert_eq!(report.bytes, 10);

    let vol = mount(&out);
    let root = vol.root();
    assert_eq!(vol.read_file(&root, "single.bin").unwrap(), vec![1, 2, 3]);
    let tree = vol.open_dir(&root, "tree").unwrap();
    assert_eq!(vol.read_file(&tree, "top.txt").unwrap(), b"top");
    let b = vol.open_dir(&vol.open_dir(&tree, "a").unwrap(), "b").unwrap();
    assert_eq!(vol.read_file(&b, "deep.txt").unwrap(), b"deep");
}

#[test]
fn test_high_density_image() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("hd.adf");

    let mut req = BuildRequest::new(&out);
    req.geometry = Geometry::HIGH_DENSITY;
    build_image(&req).unwrap();

    assert_eq!(fs::metadata(&out).unwrap().len(), 1_802_240);
    let vol = mount(&out);
    assert_eq!(vol.root().key(), 1760);
}

#[test]
fn test_fixed_timestamp_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("f.txt");
    fs::write(&input, "same").unwrap();

    let build = |name: &str| {
        let out = temp.path().join(name);
        let mut req = BuildRequest::new(&out);
        req.timestamp = Some(1_700_000_000);
        req.inputs = vec![input.clone()];
        build_image(&req).unwrap();
        fs::read(out).unwrap()
    };
    assert_eq!(build("one.adf"), build("two.adf"));
}

#[test]
fn test_unwritable_output_fails() {
    let temp = TempDir::new().unwrap();
    let req = BuildRequest::new(temp.path().join("no/such/dir/out.adf"));
    assert!(matches!(
        build_image(&req),
        Err(AdfError::CreateDevice { .. })
    ));
}

#[test]
fn test_duplicate_top_level_names_abort() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("one")).unwrap();
    fs::create_dir_all(temp.path().join("two")).unwrap();
    fs::write(temp.path().join("one/same.txt"), "1").unwrap();
    fs::write(temp.path().join("two/SAME.TXT"), "2").unwrap();
    let out = temp.path().join("dup.adf");

    let mut req = BuildRequest::new(&out);
    req.inputs = vec![
        temp.path().join("one/same.txt"),
        temp.path().join("two/SAME.TXT"),
    ];
    assert!(matches!(
        build_image(&req),
        Err(AdfError::AlreadyExists(_))
    ));
    assert!(!out.exists());
}

#[test]
fn test_manifest_build() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "from manifest").unwrap();
    let manifest = temp.path().join("build.json");
    fs::write(
        &manifest,
        r#"{ "label": "MANI", "inputs": ["a.txt"], "output": "m.adf" }"#,
    )
    .unwrap();

    let req = BuildRequest::from_json_path(&manifest).unwrap();
    build_image(&req).unwrap();

    let vol = mount(&temp.path().join("m.adf"));
    assert_eq!(vol.label(), "MANI");
    assert_eq!(
        vol.read_file(&vol.root(), "a.txt").unwrap(),
        b"from manifest"
    );
}
