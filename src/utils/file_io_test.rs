use std::io::Write;

use super::file_io::open_file_for_append;

#[test]
fn test_open_file_for_append_should_create_parents_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs/nested/engine.log");

    {
        let mut f = open_file_for_append(&path).unwrap();
        writeln!(f, "first").unwrap();
    }
    {
        let mut f = open_file_for_append(&path).unwrap();
        writeln!(f, "second").unwrap();
    }

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}
