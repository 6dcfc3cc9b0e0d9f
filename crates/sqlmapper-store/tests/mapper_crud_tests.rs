#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{memory_registry, ts, Author, Book, Person};
use proptest::prelude::*;
use sqlmapper_store::params;

#[test]
fn test_person_scenario() {
    // Given a fresh database
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();

    // When Ann is saved and read back
    let ann = Person {
        id: 1,
        name: "Ann".to_string(),
        birthday: ts(1_700_000_000),
    };
    assert!(people.save(&ann).unwrap());

    // Then every field survives
    assert_eq!(people.get(1), Some(ann));

    // When the row is replaced with a zero birthday
    let ann2 = Person {
        id: 1,
        name: "Ann2".to_string(),
        birthday: None,
    };
    assert!(people.save(&ann2).unwrap());

    // Then the birthday reads back absent
    assert_eq!(people.get(1), Some(ann2));

    // And a multi-key fetch returns only the existing row
    assert_eq!(people.gets(&[1, 2, 3]).len(), 1);
}

#[test]
fn test_get_missing_row_is_none() {
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();
    assert_eq!(people.get(42), None);
}

#[test]
fn test_gets_removes_duplicate_keys() {
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();
    for id in 1..=3 {
        people
            .save(&Person {
                id,
                name: format!("p{}", id),
                birthday: None,
            })
            .unwrap();
    }

    let before = people.stats().queries;
    let rows = people.gets(&[2, 2, 1, 2]);

    assert_eq!(rows.len(), 2);
    assert_eq!(people.stats().queries, before + 1);
}

#[test]
fn test_empty_key_set_runs_no_query() {
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();

    let before = people.stats().queries;
    assert!(people.gets(&[]).is_empty());
    assert!(people.gets_csv("").is_empty());
    assert_eq!(people.stats().queries, before);
}

#[test]
fn test_gets_csv_skips_invalid_tokens() {
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();
    for id in [1, 3, 5] {
        people
            .save(&Person {
                id,
                name: "x".to_string(),
                birthday: None,
            })
            .unwrap();
    }

    let mut ids: Vec<i32> = people
        .gets_csv("1, 3,abc,,5,99999999999")
        .into_iter()
        .map(|p| p.id)
        .collect();
    ids.sort();

    assert_eq!(ids, vec![1, 3, 5]);
}

#[test]
fn test_save_all_reports_non_empty_batch() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();

    assert!(!books.save_all(&[]).unwrap());

    let batch = vec![
        Book::new(1, "Dune", 412, 1),
        Book::new(2, "Emma", 300, 2),
        Book::new(1, "Dune (2nd ed.)", 420, 1),
    ];
    assert!(books.save_all(&batch).unwrap());

    assert_eq!(books.count(), 2);
    assert_eq!(books.get(1).unwrap().title, "Dune (2nd ed.)");
    assert_eq!(books.stats().writes, 3);
}

#[test]
fn test_delete_variants() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();
    books
        .save_all(&[
            Book::new(1, "a", 10, 1),
            Book::new(2, "b", 20, 1),
            Book::new(3, "c", 30, 2),
            Book::new(4, "d", 40, 2),
        ])
        .unwrap();

    assert!(books.delete(&Book::new(1, "", 0, 0)).unwrap());
    assert!(!books.delete(&Book::new(1, "", 0, 0)).unwrap());
    assert!(books.delete_by(2).unwrap());
    assert_eq!(books.delete_where("author_id = ?", params![2]).unwrap(), 2);

    assert_eq!(books.count(), 0);
}

#[test]
fn test_update_where() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();
    books
        .save_all(&[Book::new(1, "a", 10, 1), Book::new(2, "b", 20, 2)])
        .unwrap();

    let changed = books
        .update_where("pages = pages + ?", "author_id = ?", params![5, 1])
        .unwrap();

    assert_eq!(changed, 1);
    assert_eq!(books.get(1).unwrap().pages, 15);
    assert_eq!(books.get(2).unwrap().pages, 20);
}

#[test]
fn test_select_family_ordering() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();
    books
        .save_all(&[
            Book::new(3, "c", 300, 1),
            Book::new(1, "b", 100, 2),
            Book::new(2, "a", 200, 1),
        ])
        .unwrap();

    let ids = |rows: Vec<Book>| rows.into_iter().map(|b| b.id).collect::<Vec<_>>();

    assert_eq!(ids(books.select()), vec![1, 2, 3]);
    assert_eq!(ids(books.select_ordered("title")), vec![2, 1, 3]);
    assert_eq!(ids(books.select_limit("title", 2, 1)), vec![1, 3]);
    assert_eq!(
        ids(books.select_where("pages >= ?", params![200])),
        vec![3, 2]
    );
    assert_eq!(
        ids(books.select_where_ordered("author_id = ?", "pages desc", params![1])),
        vec![3, 2]
    );
    assert_eq!(
        ids(books.select_where_limit("pages > ?", "id", params![0], 1, 1)),
        vec![2]
    );
}

#[test]
fn test_aggregates() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();
    books
        .save_all(&[
            Book::new(1, "a", 10, 1),
            Book::new(2, "b", 20, 1),
            Book::new(3, "c", 30, 2),
        ])
        .unwrap();

    assert_eq!(books.count(), 3);
    assert_eq!(books.count_where("pages > ?", params![15]), 2);

    let mut per_author = books.count_group_by("author_id");
    per_author.sort();
    assert_eq!(per_author, vec![1, 2]);

    let mut filtered = books.count_where_group_by("pages > ?", "author_id", params![10]);
    filtered.sort();
    assert_eq!(filtered, vec![1, 1]);

    assert_eq!(books.sum_where("pages", "author_id = ?", params![1]), 30);
    // field names resolve to their column
    assert_eq!(books.sum_where("authorId", "pages > ?", params![0]), 4);
    assert_eq!(books.sum_where("pages", "author_id = ?", params![9]), 0);

    let mut sums = books.sum_where_group_by("pages", "pages > ?", "author_id", params![0]);
    sums.sort();
    assert_eq!(sums, vec![30, 30]);
}

#[test]
fn test_bad_predicate_degrades_to_empty() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();
    books.save(&Book::new(1, "a", 10, 1)).unwrap();

    assert!(books.select_where("no_such_column = ?", params![1]).is_empty());
    assert_eq!(books.count_where("no_such_column = ?", params![1]), 0);
}

#[test]
fn test_bad_predicate_fails_writes() {
    let registry = memory_registry();
    let books = registry.mapper::<Book>().unwrap();

    let err = books
        .delete_where("no_such_column = ?", params![1])
        .unwrap_err();

    assert_eq!(err.op(), Some("delete_where"));
    assert_eq!(err.table(), Some("book"));
}

#[test]
fn test_default_table_name() {
    let registry = memory_registry();
    assert_eq!(registry.mapper::<Author>().unwrap().table(), "author");
    assert_eq!(registry.mapper::<Person>().unwrap().table(), "ts_person");
}

prop_compose! {
    fn any_person()(
        id in 1i32..50,
        name in "[a-zA-Z ]{0,16}",
        secs in proptest::option::of(1i64..4_000_000_000i64),
    ) -> Person {
        Person { id, name, birthday: secs.and_then(ts) }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_save_then_get_round_trips(person in any_person()) {
        let registry = memory_registry();
        let people = registry.mapper::<Person>().unwrap();

        people.save(&person).unwrap();

        prop_assert_eq!(people.get(person.id), Some(person));
    }

    #[test]
    fn prop_second_save_with_same_key_wins(first in any_person(), second in any_person()) {
        let registry = memory_registry();
        let people = registry.mapper::<Person>().unwrap();
        let second = Person { id: first.id, ..second };

        people.save(&first).unwrap();
        people.save(&second).unwrap();

        prop_assert_eq!(people.count(), 1);
        prop_assert_eq!(people.get(first.id), Some(second));
    }
}
