mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use pmocontrolpoint::{
    BrowseOptions, BrowseState, ContentDirectoryBrowser, ContentSource, ControlPointError,
    DeviceProxy, DirectoryTreeNavigator, EntryListener, MediaServerProxy, NavigatorStack,
    ScoredIconSelector,
};

const WAIT: Duration = Duration::from_secs(5);

fn fast_browser() -> ContentDirectoryBrowser {
    ContentDirectoryBrowser::new(BrowseOptions {
        batch_size: 10,
        batch_interval: Duration::from_millis(20),
        page_size: 10,
    })
}

// Racine : deux albums et une piste ; "album-1" contient 15 pistes
fn library() -> Arc<dyn ContentSource> {
    let mut tree = HashMap::new();
    let mut root = vec![
        container("album-1", "0", "Kind of Blue"),
        container("album-2", "0", "Blue Train"),
    ];
    root.extend(items("0", 1));
    tree.insert("0".to_string(), root);
    tree.insert("album-1".to_string(), items("album-1", 15));
    tree.insert("album-2".to_string(), Vec::new());

    let proxy = MediaServerProxy::from_device(
        media_server("uuid:library", tree).into_raw(),
        Arc::new(ScoredIconSelector::default()),
    )
    .unwrap();
    Arc::new(proxy)
}

fn settled(navigator: &DirectoryTreeNavigator) -> bool {
    wait_until(WAIT, || !navigator.is_in_progress())
}

#[test]
fn test_root_navigator() {
    let root = DirectoryTreeNavigator::root();
    assert!(root.is_root());
    assert_eq!(root.parent_id(), "");
    assert_eq!(root.parent_title(), "");
    assert_eq!(root.browse_id(), "0");
    assert!(root.is_in_progress());
    assert!(root.is_empty());

    let child = DirectoryTreeNavigator::new("album-1", "Kind of Blue");
    assert!(!child.is_root());
    assert_eq!(child.browse_id(), "album-1");
}

#[test]
fn test_bind_browse_fills_entries() {
    let navigator = DirectoryTreeNavigator::root();
    let recorder = Arc::new(EntryRecorder::default());
    navigator.add_listener(recorder.clone());
    // Le listener reçoit l'état courant immédiatement
    assert_eq!(recorder.calls(), vec![(0, true)]);

    let handle = fast_browser().prepare(library(), navigator.browse_id());
    navigator.bind_browse(handle.clone()).unwrap();
    assert_eq!(handle.wait(WAIT), BrowseState::Completed);
    assert!(settled(&navigator));

    assert_eq!(navigator.len(), 3);
    assert_eq!(navigator.entries()[0].title(), "Kind of Blue");
    assert_eq!(recorder.last(), Some((3, false)));
}

#[test]
fn test_selection() {
    let navigator = DirectoryTreeNavigator::root();
    navigator
        .bind_browse(fast_browser().prepare(library(), "0"))
        .unwrap();
    assert!(settled(&navigator));

    assert!(navigator.select(1));
    assert_eq!(navigator.selected_index(), Some(1));
    assert_eq!(navigator.selected_object().unwrap().id, "album-2");

    assert!(!navigator.select(7));
    assert_eq!(navigator.selected_index(), None);
    assert!(navigator.selected_object().is_none());

    navigator.select(0);
    navigator.clear_selection();
    assert_eq!(navigator.selected_index(), None);
}

#[test]
fn test_enter_child_checks_index_and_kind() {
    let navigator = DirectoryTreeNavigator::root();
    navigator
        .bind_browse(fast_browser().prepare(library(), "0"))
        .unwrap();
    assert!(settled(&navigator));

    assert!(matches!(
        navigator.enter_child(3),
        Err(ControlPointError::IndexOutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        navigator.enter_child(2),
        Err(ControlPointError::NotAContainer(id)) if id == "item-0"
    ));

    navigator.select(2);
    let child = navigator.enter_child(0).unwrap();
    assert_eq!(child.parent_id(), "album-1");
    assert_eq!(child.parent_title(), "Kind of Blue");
    // La sélection courante devient l'index de descente
    assert_eq!(navigator.descended_from(), Some(2));
    assert_eq!(navigator.selected_index(), None);

    navigator.enter_child(1).unwrap();
    assert_eq!(navigator.descended_from(), None);
}

#[test]
fn test_rebinding_discards_previous_browse() {
    let slow = Arc::new(VecSource::new(items("0", 100)).with_delay(Duration::from_millis(30)));
    let navigator = DirectoryTreeNavigator::root();
    let first = fast_browser().prepare(slow, "0");
    navigator.bind_browse(first.clone()).unwrap();

    let second = fast_browser().prepare(library(), "0");
    navigator.bind_browse(second.clone()).unwrap();

    assert!(first.is_cancelled());
    assert_eq!(second.wait(WAIT), BrowseState::Completed);
    assert!(settled(&navigator));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(navigator.len(), 3);
}

#[test]
fn test_rebinding_publishes_empty_list() {
    let navigator = DirectoryTreeNavigator::root();
    navigator
        .bind_browse(fast_browser().prepare(library(), "0"))
        .unwrap();
    assert!(settled(&navigator));

    let recorder = Arc::new(EntryRecorder::default());
    navigator.add_listener(recorder.clone());
    assert_eq!(recorder.last(), Some((3, false)));

    let slow = Arc::new(VecSource::new(items("0", 5)).with_delay(Duration::from_millis(300)));
    let handle = fast_browser().prepare(slow, "0");
    navigator.bind_browse(handle.clone()).unwrap();
    assert_eq!(recorder.calls()[1], (0, true));

    assert_eq!(handle.wait(WAIT), BrowseState::Completed);
    assert!(settled(&navigator));
    assert_eq!(recorder.last(), Some((5, false)));
}

#[test]
fn test_bind_running_browse_replays_delivered_results() {
    let handle = fast_browser().prepare(library(), "album-1");
    handle.start().unwrap();
    assert_eq!(handle.wait(WAIT), BrowseState::Completed);

    let navigator = DirectoryTreeNavigator::new("album-1", "Kind of Blue");
    navigator.bind_browse(handle).unwrap();

    assert_eq!(navigator.len(), 15);
    assert!(!navigator.is_in_progress());
}

#[test]
fn test_clear_state_and_cancel() {
    let slow = Arc::new(VecSource::new(items("0", 100)).with_delay(Duration::from_millis(20)));
    let navigator = DirectoryTreeNavigator::root();
    let recorder = Arc::new(EntryRecorder::default());
    let as_listener: Arc<dyn EntryListener> = recorder.clone();
    navigator.add_listener(as_listener.clone());

    let handle = fast_browser().prepare(slow.clone(), "0");
    navigator.bind_browse(handle.clone()).unwrap();
    assert!(wait_until(WAIT, || !navigator.is_empty()));

    navigator.cancel();
    assert!(handle.is_cancelled());
    assert!(!navigator.is_in_progress());
    let kept = navigator.len();
    assert!(kept > 0);
    assert_eq!(recorder.last(), Some((kept, false)));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(recorder.last(), Some((kept, false)));

    navigator.clear_state();
    assert!(navigator.is_empty());
    assert!(navigator.is_in_progress());
    assert_eq!(recorder.last(), Some((0, true)));

    assert!(navigator.remove_listener(&as_listener));
    assert!(!navigator.remove_listener(&as_listener));
}

#[test]
fn test_stack_descend_and_ascend() {
    let mut stack = NavigatorStack::new(fast_browser(), library());
    stack.reload().unwrap();
    assert!(settled(stack.current()));
    assert_eq!(stack.depth(), 1);
    assert!(stack.path().is_empty());

    stack.current().select(0);
    let album = stack.enter_child(0).unwrap();
    assert_eq!(album.parent_id(), "album-1");
    assert!(settled(stack.current()));
    assert_eq!(stack.current().len(), 15);
    assert_eq!(stack.depth(), 2);
    assert_eq!(stack.path(), vec!["Kind of Blue"]);

    assert!(stack.ascend());
    assert_eq!(stack.depth(), 1);
    assert_eq!(stack.current().descended_from(), Some(0));
    assert_eq!(stack.current().len(), 3);
    assert!(!stack.ascend());
}

#[test]
fn test_stack_rejects_items() {
    let mut stack = NavigatorStack::new(fast_browser(), library());
    stack.reload().unwrap();
    assert!(settled(stack.current()));

    assert!(stack.enter_child(2).is_err());
    assert!(stack.enter_child(42).is_err());
    assert_eq!(stack.depth(), 1);
}

#[test]
fn test_stack_empty_container() {
    let mut stack = NavigatorStack::new(fast_browser(), library());
    stack.reload().unwrap();
    assert!(settled(stack.current()));

    stack.enter_child(1).unwrap();
    assert!(settled(stack.current()));
    assert!(stack.current().is_empty());
    assert_eq!(stack.path(), vec!["Blue Train"]);
}
