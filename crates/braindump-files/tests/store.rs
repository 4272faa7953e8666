use braindump_core::{BraindumpService, Error, NoteUpdate};
use braindump_files::FileStore;
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn setup() -> (TempDir, BraindumpService<FileStore>) {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).unwrap();
    (temp_dir, BraindumpService::new(store))
}

/// Every record on disk has exactly one index row pointing at it, and every
/// index row points at a readable record with the same ID.
fn assert_consistent(store: &FileStore) {
    let on_disk = store.repository().locations().unwrap();
    let entries = store.index().entries().unwrap();

    let mut ids = HashSet::new();
    for (id, location) in &entries {
        assert!(ids.insert(id.clone()), "duplicate index row for {}", id);
        let note = store.repository().read(location).unwrap();
        assert_eq!(&note.id, id, "index row {} points at another note", location);
    }

    let indexed: HashSet<_> = entries.iter().map(|(_, l)| l.clone()).collect();
    let stored: HashSet<_> = on_disk.into_iter().collect();
    assert_eq!(indexed, stored);
}

#[test]
fn scenario_add_then_get() {
    let (_temp, service) = setup();
    let added = service
        .add_note("creds", "Stripe Key", "sk_test_123", vec![])
        .unwrap();

    let note = service.get_note(&added.id).unwrap();
    assert_eq!(note.category, "creds");
    assert_eq!(note.title, "Stripe Key");
    assert_eq!(note.content, "sk_test_123");
    assert_eq!(note.created, note.updated);
    assert_consistent(service.store());
}

#[test]
fn scenario_search_by_tag_only() {
    let (_temp, service) = setup();
    let payment = service
        .add_note("creds", "Stripe", "sk_test_123", vec!["payment".into()])
        .unwrap();
    service
        .add_note("creds", "AWS", "AKIA...", vec!["infra".into()])
        .unwrap();

    let results = service.search("", None, &["payment".into()]).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, payment.id);
}

#[test]
fn scenario_change_category() {
    let (temp, service) = setup();
    let note = service
        .add_note("inbox", "Webhook Secret", "whsec_123", vec![])
        .unwrap();

    service
        .update_note(
            &note.id,
            NoteUpdate {
                category: Some("creds".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(service.list_notes(Some("inbox")).unwrap().is_empty());
    let moved = service.list_notes(Some("creds")).unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id, note.id);

    let records: Vec<_> = service
        .store()
        .repository()
        .locations()
        .unwrap()
        .into_iter()
        .filter(|l| service.store().repository().read(l).unwrap().id == note.id)
        .collect();
    assert_eq!(records.len(), 1);
    assert!(temp.path().join("creds").join("webhook-secret.md").is_file());
    assert_consistent(service.store());
}

#[test]
fn delete_then_get_is_not_found() {
    let (_temp, service) = setup();
    let note = service.add_note("c", "Temp", "x", vec![]).unwrap();

    service.delete_note(&note.id).unwrap();
    assert!(service.get_note(&note.id).unwrap_err().is_not_found());
    assert!(service.store().index().location_of(&note.id).is_err());
    assert_consistent(service.store());
}

#[test]
fn slug_collision_keeps_both_notes() {
    let (_temp, service) = setup();
    let first = service.add_note("c", "My Note!", "one", vec![]).unwrap();
    let second = service.add_note("c", "My Note?", "two", vec![]).unwrap();

    assert_eq!(service.get_note(&first.id).unwrap().content, "one");
    assert_eq!(service.get_note(&second.id).unwrap().content, "two");
    assert_eq!(service.list_notes(Some("c")).unwrap().len(), 2);
    assert_consistent(service.store());
}

#[test]
fn updating_one_of_two_colliding_notes_leaves_the_other_alone() {
    let (_temp, service) = setup();
    let first = service.add_note("c", "My Note!", "one", vec![]).unwrap();
    let second = service.add_note("c", "My Note?", "two", vec![]).unwrap();

    service.append_note(&first.id, "more").unwrap();
    service.append_note(&second.id, "more").unwrap();

    assert_eq!(service.get_note(&first.id).unwrap().content, "one\nmore");
    assert_eq!(service.get_note(&second.id).unwrap().content, "two\nmore");
    assert_consistent(service.store());
}

#[test]
fn index_stays_consistent_over_mixed_operations() {
    let (_temp, service) = setup();
    let mut ids = Vec::new();
    for i in 0..12 {
        let note = service
            .add_note(
                &format!("cat-{}", i % 3),
                &format!("Note {}", i % 5),
                &format!("content {}", i),
                vec![format!("t{}", i % 2)],
            )
            .unwrap();
        ids.push(note.id);
    }
    assert_consistent(service.store());

    for (i, id) in ids.iter().enumerate() {
        match i % 4 {
            0 => {
                service.delete_note(id).unwrap();
            }
            1 => {
                service
                    .update_note(
                        id,
                        NoteUpdate {
                            title: Some(format!("Renamed {}", i % 2)),
                            category: Some("moved".into()),
                            ..Default::default()
                        },
                    )
                    .unwrap();
            }
            2 => {
                service.append_note(id, "appended").unwrap();
            }
            _ => {}
        }
        assert_consistent(service.store());
    }

    let notes = service.list_notes(None).unwrap();
    assert_eq!(notes.len(), 9);
    let by_category: HashMap<_, usize> = notes.iter().fold(HashMap::new(), |mut m, n| {
        *m.entry(n.category.clone()).or_default() += 1;
        m
    });
    assert_eq!(by_category.get("moved"), Some(&3));
}

#[test]
fn resolver_is_shared_by_mutations() {
    let (_temp, service) = setup();
    service.add_note("a", "Shared", "one", vec![]).unwrap();
    service.add_note("b", "Shared", "two", vec![]).unwrap();

    let err = service.append_note("Shared", "x").unwrap_err();
    let candidates = err.candidates().unwrap().to_vec();
    assert_eq!(candidates.len(), 2);
    assert!(matches!(err, Error::AmbiguousTitle { .. }));

    assert!(matches!(
        service.delete_note("Shared"),
        Err(Error::AmbiguousTitle { .. })
    ));
    let again = service
        .update_note(
            "Shared",
            NoteUpdate {
                content: Some("z".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(again.candidates().unwrap(), candidates.as_slice());

    let target = &candidates[0];
    let deleted = service.delete_note(&target.id).unwrap();
    assert_eq!(deleted.id, target.id);
    assert_eq!(
        service.find_note("Shared").unwrap().id,
        candidates[1].id
    );
}

#[test]
fn ranked_search_puts_exact_title_first() {
    let (_temp, service) = setup();
    service.add_note("c", "Key", "stripe", vec![]).unwrap();
    service
        .add_note("c", "x", "stripe key details", vec![])
        .unwrap();
    service.add_note("c", "Stripe Key", "x", vec![]).unwrap();

    let results = service.search("stripe key", None, &[]).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title, "Stripe Key");
}

#[test]
fn notes_survive_reopen_and_index_rebuild() {
    let temp = TempDir::new().unwrap();
    let note = {
        let service = BraindumpService::new(FileStore::open(temp.path()).unwrap());
        let note = service
            .add_note("creds", "Stripe Key", "sk_test_123", vec!["payment".into()])
            .unwrap();
        service.close().unwrap();
        note
    };

    std::fs::remove_dir_all(temp.path().join(braindump_files::INDEX_DIR)).unwrap();

    let service = BraindumpService::new(FileStore::open(temp.path()).unwrap());
    let found = service.search("stripe", None, &[]).unwrap();
    assert_eq!(found, vec![note]);
    assert_eq!(service.tags().unwrap(), vec!["payment"]);
    assert_consistent(service.store());
}

#[test]
fn tag_only_search_finds_notes_beyond_the_first_hundred() {
    let (_temp, service) = setup();
    for i in 0..braindump_core::SEARCH_LIMIT + 5 {
        service
            .add_note("a", &format!("Note {}", i), "x", vec![])
            .unwrap();
    }
    let tagged = service
        .add_note("z", "Stripe", "sk_test_123", vec!["payment".into()])
        .unwrap();

    let results = service.search("", None, &["Payment".into()]).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, tagged.id);
    assert_consistent(service.store());
}
