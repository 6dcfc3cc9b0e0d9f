#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlmapper_core::{Entity, FieldDecl, ModelDecl, RelationDecl};
use sqlmapper_store::{ContextConfig, OrmConfig, Registry};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub birthday: Option<DateTime<Utc>>,
}

impl Entity for Person {
    type Key = i32;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .table("ts_person")
            .default_constructor()
            .field(
                FieldDecl::column::<i32>("id")
                    .primary_key()
                    .bind(|p: &Person| p.id, |p, v| p.id = v),
            )
            .field(
                FieldDecl::column::<String>("name")
                    .index()
                    .bind(|p: &Person| p.name.clone(), |p, v| p.name = v),
            )
            .field(
                FieldDecl::column::<Option<DateTime<Utc>>>("birthday")
                    .bind(|p: &Person| p.birthday, |p, v| p.birthday = v),
            )
    }
}

/// An older shape of `Person`, for migration tests
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonV1 {
    pub id: i32,
    pub name: String,
}

impl Entity for PersonV1 {
    type Key = i32;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .table("ts_person")
            .default_constructor()
            .field(
                FieldDecl::column::<i32>("id")
                    .primary_key()
                    .bind(|p: &PersonV1| p.id, |p, v| p.id = v),
            )
            .field(
                FieldDecl::column::<String>("name")
                    .bind(|p: &PersonV1| p.name.clone(), |p, v| p.name = v),
            )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

impl Entity for Author {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|a: &Author| a.id, |a, v| a.id = v),
            )
            .field(
                FieldDecl::column::<String>("name")
                    .bind(|a: &Author| a.name.clone(), |a, v| a.name = v),
            )
    }
}

/// Single relation on an integer link
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub pages: i32,
    pub author_id: i64,
    pub author: Option<Author>,
}

impl Book {
    pub fn new(id: i64, title: &str, pages: i32, author_id: i64) -> Self {
        Self {
            id,
            title: title.to_string(),
            pages,
            author_id,
            author: None,
        }
    }
}

impl Entity for Book {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|b: &Book| b.id, |b, v| b.id = v),
            )
            .field(
                FieldDecl::column::<String>("title")
                    .bind(|b: &Book| b.title.clone(), |b, v| b.title = v),
            )
            .field(FieldDecl::column::<i32>("pages").bind(|b: &Book| b.pages, |b, v| b.pages = v))
            .field(
                FieldDecl::column::<i64>("authorId")
                    .named("author_id")
                    .bind(|b: &Book| b.author_id, |b, v| b.author_id = v),
            )
            .relation(
                RelationDecl::one::<Author>("author", "authorId")
                    .bind_one(|b: &Book| b.author.clone(), |b, v| b.author = v),
            )
    }
}

/// Collection relation on a comma-joined text link
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shelf {
    pub id: i32,
    pub label: String,
    pub book_ids: String,
    pub books: Vec<Book>,
}

impl Entity for Shelf {
    type Key = i32;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i32>("id")
                    .primary_key()
                    .bind(|s: &Shelf| s.id, |s, v| s.id = v),
            )
            .field(
                FieldDecl::column::<String>("label")
                    .bind(|s: &Shelf| s.label.clone(), |s, v| s.label = v),
            )
            .field(
                FieldDecl::column::<String>("bookIds")
                    .bind(|s: &Shelf| s.book_ids.clone(), |s, v| s.book_ids = v),
            )
            .relation(
                RelationDecl::many::<Book>("books", "bookIds")
                    .bind_many(|s: &Shelf| s.books.clone(), |s, v| s.books = v),
            )
    }
}

/// Set relation on an integer link
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reader {
    pub id: i64,
    pub favorite_id: i64,
    pub favorites: Vec<Book>,
}

impl Entity for Reader {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|r: &Reader| r.id, |r, v| r.id = v),
            )
            .field(
                FieldDecl::column::<i64>("favoriteId")
                    .bind(|r: &Reader| r.favorite_id, |r, v| r.favorite_id = v),
            )
            .relation(
                RelationDecl::set::<Book>("favorites", "favoriteId")
                    .bind_many(|r: &Reader| r.favorites.clone(), |r, v| r.favorites = v),
            )
    }
}

/// List relation on an integer link: the books whose key is `top_id`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pile {
    pub id: i64,
    pub top_id: i64,
    pub books: Vec<Book>,
}

impl Entity for Pile {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|p: &Pile| p.id, |p, v| p.id = v),
            )
            .field(
                FieldDecl::column::<i64>("topId")
                    .bind(|p: &Pile| p.top_id, |p, v| p.top_id = v),
            )
            .relation(
                RelationDecl::many::<Book>("books", "topId")
                    .bind_many(|p: &Pile| p.books.clone(), |p, v| p.books = v),
            )
    }
}

/// Self-referencing entity
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub id: i64,
    pub parent_id: i64,
    pub parent: Option<Box<Node>>,
}

impl Node {
    pub fn new(id: i64, parent_id: i64) -> Self {
        Self {
            id,
            parent_id,
            parent: None,
        }
    }
}

impl Entity for Node {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|n: &Node| n.id, |n, v| n.id = v),
            )
            .field(
                FieldDecl::column::<i64>("parentId")
                    .bind(|n: &Node| n.parent_id, |n, v| n.parent_id = v),
            )
            .relation(RelationDecl::one::<Node>("parent", "parentId").bind_one(
                |n: &Node| n.parent.as_deref().cloned(),
                |n, v: Option<Node>| n.parent = v.map(Box::new),
            ))
    }
}

pub fn full_registry(config: OrmConfig) -> Arc<Registry> {
    Registry::builder(config)
        .register::<Person>()
        .register::<Author>()
        .register::<Book>()
        .register::<Shelf>()
        .register::<Reader>()
        .register::<Pile>()
        .register::<Node>()
        .build()
        .expect("registry builds")
}

pub fn memory_registry() -> Arc<Registry> {
    full_registry(OrmConfig::in_memory("default"))
}

pub fn file_config(dir: &Path) -> OrmConfig {
    OrmConfig::default().with_context(
        ContextConfig::in_directory("default", dir)
            .with_user_id("1")
            .with_lock_backoff_ms(20),
    )
}

pub fn ts(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}
