use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tempfile::tempdir;
use treepack::export::{plan, write_archive, WorkerPool};
use treepack::{export_archive, Error};

/// Entry name -> content (`None` for directories), in archive order.
fn read_entries(archive: &Path) -> Vec<(String, Option<Vec<u8>>)> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let name = entry.name().to_string();
            if entry.is_dir() {
                (name, None)
            } else {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).unwrap();
                (name, Some(buf))
            }
        })
        .collect()
}

fn sample_tree(root: &Path) {
    fs::write(root.join("a.txt"), b"hi").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.txt"), b"bye").unwrap();
}

#[test]
fn export_reconstructs_tree_byte_for_byte() {
    let src = tempdir().unwrap();
    sample_tree(src.path());
    let out = tempdir().unwrap();
    let archive = out.path().join("tree.zip");

    export_archive(src.path(), &archive, 4).unwrap();

    let entries: BTreeMap<_, _> = read_entries(&archive).into_iter().collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries["a.txt"].as_deref(), Some(&b"hi"[..]));
    assert_eq!(entries["sub/"], None);
    assert_eq!(entries["sub/b.txt"].as_deref(), Some(&b"bye"[..]));

    // Extract and compare with the source.
    let restored = tempdir().unwrap();
    zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap().extract(restored.path()).unwrap();
    assert_eq!(fs::read(restored.path().join("a.txt")).unwrap(), b"hi");
    assert!(restored.path().join("sub").is_dir());
    assert_eq!(fs::read(restored.path().join("sub/b.txt")).unwrap(), b"bye");
}

#[test]
fn empty_directory_gives_empty_archive() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    let archive = out.path().join("empty.zip");

    let summary = export_archive(src.path(), &archive, 2).unwrap();
    assert_eq!(summary.entries, 0);
    assert!(read_entries(&archive).is_empty());
}

#[test]
fn nonexistent_source_fails_without_creating_destination() {
    let out = tempdir().unwrap();
    let archive = out.path().join("never.zip");

    let err = export_archive(out.path().join("missing"), &archive, 2).unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert!(!archive.exists());
}

#[test]
fn unwritable_destination_fails() {
    let src = tempdir().unwrap();
    sample_tree(src.path());
    let out = tempdir().unwrap();

    let err = export_archive(src.path(), out.path().join("no/such/dir/out.zip"), 2).unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn worker_count_does_not_change_the_archive() {
    let src = tempdir().unwrap();
    for d in 0..4 {
        let dir = src.path().join(format!("dir{d}"));
        fs::create_dir(&dir).unwrap();
        for f in 0..10 {
            fs::write(dir.join(format!("file{f}.dat")), vec![(d * 10 + f) as u8; 64 * (f + 1)]).unwrap();
        }
    }
    let out = tempdir().unwrap();

    let archives: Vec<_> = [1, 2, 8]
        .into_iter()
        .map(|workers| {
            let path = out.path().join(format!("w{workers}.zip"));
            export_archive(src.path(), &path, workers).unwrap();
            read_entries(&path)
        })
        .collect();

    assert_eq!(archives[0].len(), 44);
    assert_eq!(archives[0], archives[1]);
    assert_eq!(archives[0], archives[2]);
}

#[test]
fn existing_destination_is_overwritten() {
    let src = tempdir().unwrap();
    sample_tree(src.path());
    let out = tempdir().unwrap();
    let archive = out.path().join("reuse.zip");
    fs::write(&archive, vec![0u8; 100_000]).unwrap();

    export_archive(src.path(), &archive, 0).unwrap();
    assert_eq!(read_entries(&archive).len(), 3);
}

#[test]
fn large_file_survives_the_pipeline() {
    let src = tempdir().unwrap();
    let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();
    fs::write(src.path().join("large.bin"), &data).unwrap();
    let out = tempdir().unwrap();
    let archive = out.path().join("large.zip");

    let summary = export_archive(src.path(), &archive, 4).unwrap();
    assert_eq!(summary.bytes, data.len() as u64);
    assert_eq!(read_entries(&archive), [("large.bin".to_string(), Some(data))]);
}

#[cfg(unix)]
#[test]
fn dangling_link_fails_the_plan_before_any_output() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("good.txt"), b"good").unwrap();
    std::os::unix::fs::symlink(src.path().join("gone"), src.path().join("dangling")).unwrap();
    let out = tempdir().unwrap();
    let archive = out.path().join("broken.zip");

    let err = export_archive(src.path(), &archive, 2).unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert!(!archive.exists());
}

#[cfg(unix)]
#[test]
fn linked_directory_is_exported_with_its_contents() {
    let src = tempdir().unwrap();
    fs::create_dir(src.path().join("real")).unwrap();
    fs::write(src.path().join("real/f.txt"), b"inside").unwrap();
    std::os::unix::fs::symlink(src.path().join("real"), src.path().join("link")).unwrap();
    let out = tempdir().unwrap();
    let archive = out.path().join("linked.zip");

    let summary = export_archive(src.path(), &archive, 2).unwrap();
    assert_eq!((summary.files, summary.directories), (2, 2));
    assert_eq!(
        read_entries(&archive),
        [
            ("link/".to_string(), None),
            ("link/f.txt".to_string(), Some(b"inside".to_vec())),
            ("real/".to_string(), None),
            ("real/f.txt".to_string(), Some(b"inside".to_vec())),
        ]
    );
}

#[cfg(unix)]
#[test]
fn link_cycle_is_reported_instead_of_walked_forever() {
    let src = tempdir().unwrap();
    fs::create_dir(src.path().join("loop")).unwrap();
    std::os::unix::fs::symlink(src.path(), src.path().join("loop/back")).unwrap();
    let out = tempdir().unwrap();
    let archive = out.path().join("cycle.zip");

    assert!(matches!(export_archive(src.path(), &archive, 2), Err(Error::Io { .. })));
    assert!(!archive.exists());
}

#[test]
fn pipeline_stages_compose() {
    let src = tempdir().unwrap();
    sample_tree(src.path());
    let out = tempdir().unwrap();
    let archive = out.path().join("staged.zip");

    let jobs = plan(src.path()).unwrap();
    let payloads = WorkerPool::new(2).read_all(jobs).unwrap();
    let totals = write_archive(payloads, &archive).unwrap();

    assert_eq!((totals.entries, totals.files, totals.directories), (3, 2, 1));
    let names: Vec<_> = read_entries(&archive).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["a.txt", "sub/", "sub/b.txt"]);
}
