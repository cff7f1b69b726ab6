use super::{resolve, Resolution};
use crate::host::MemoryDocuments;
use crate::model::Node;

fn docs_with_file() -> MemoryDocuments {
    let docs = MemoryDocuments::new();
    docs.insert_file("F", &"line\n".repeat(20));
    docs
}

#[test]
fn test_anchor_on_recorded_line() {
    let docs = docs_with_file();
    let node = Node::bookmark("b", "F", 10);
    assert_eq!(resolve(&docs, &node), Resolution::SameLine(10));
}

#[test]
fn test_anchor_moved() {
    let docs = docs_with_file();
    let node = Node::bookmark("b", "F", 10);
    docs.move_anchor(&node.id, 7);
    assert_eq!(resolve(&docs, &node), Resolution::MovedTo(7));
}

#[test]
fn test_anchor_moved_back_to_recorded_line() {
    let docs = docs_with_file();
    let node = Node::bookmark("b", "F", 10);
    docs.move_anchor(&node.id, 10);
    assert_eq!(resolve(&docs, &node), Resolution::SameLine(10));
}

#[test]
fn test_unresolvable_cases() {
    let docs = docs_with_file();

    let invalidated = Node::bookmark("b", "F", 1);
    docs.invalidate_anchor(&invalidated.id);
    assert_eq!(resolve(&docs, &invalidated), Resolution::Unresolvable);

    let closed = Node::bookmark("c", "closed.rs", 1);
    assert_eq!(resolve(&docs, &closed), Resolution::Unresolvable);

    let malformed = Node::bookmark("m", "", 1);
    assert_eq!(resolve(&docs, &malformed), Resolution::Unresolvable);

    let group = Node::group("g");
    assert_eq!(resolve(&docs, &group), Resolution::Unresolvable);
}

#[test]
fn test_file_closed_after_anchor_moved() {
    let docs = docs_with_file();
    let node = Node::bookmark("b", "F", 10);
    docs.move_anchor(&node.id, 4);
    docs.remove_file("F");
    assert_eq!(resolve(&docs, &node), Resolution::Unresolvable);
}
