//! Built-in natives driven through real programs.

mod common;

use std::io::Write;

use common::run_ok;

#[test]
fn clock_returns_a_nonnegative_number() {
    assert_eq!(run_ok("print clock() >= 0;"), "true\n");
}

#[test]
fn clock_is_monotonic_enough_to_diff() {
    assert_eq!(
        run_ok("var t1 = clock(); var t2 = clock(); print t2 >= t1;"),
        "true\n"
    );
}

#[test]
fn read_file_returns_contents() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "line one").expect("write");
    let path = file.path().display();
    assert_eq!(
        run_ok(&format!("print readFile(\"{path}\");")),
        "line one\n"
    );
}

#[test]
fn read_file_results_are_interned() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "same bytes").expect("write");
    let path = file.path().display();
    assert_eq!(
        run_ok(&format!(
            "print readFile(\"{path}\") == readFile(\"{path}\");"
        )),
        "true\n"
    );
}

#[test]
fn read_file_feeds_concatenation() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "abc").expect("write");
    let path = file.path().display();
    assert_eq!(
        run_ok(&format!("print readFile(\"{path}\") + \"!\";")),
        "abc!\n"
    );
}
