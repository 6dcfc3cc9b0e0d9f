use chrono::{DateTime, Utc};
use sqlmapper_core::{Entity, FieldDecl, MethodDecl, ModelDecl, RelationDecl};

/// Explicitly bound entity with a timestamp column
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

/// Entity whose accessors are found by method naming convention
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub done: bool,
    pub owner_id: i32,
    pub owner: Option<Person>,
}

impl Entity for Task {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(FieldDecl::column::<i64>("id").primary_key())
            .field(FieldDecl::column::<String>("title"))
            .field(FieldDecl::column::<bool>("done"))
            .field(FieldDecl::column::<i32>("ownerId"))
            .relation(RelationDecl::one::<Person>("owner", "ownerId"))
            .transient("cachedLabel")
            .method(MethodDecl::getter("getId", |t: &Task| t.id))
            .method(MethodDecl::setter("setId", |t: &mut Task, v: i64| t.id = v))
            .method(MethodDecl::getter("getTitle", |_: &Task| String::new()).as_static())
            .method(MethodDecl::getter("getTitle", |t: &Task| t.title.clone()))
            .method(MethodDecl::setter("setTitle", |t: &mut Task, v: String| {
                t.title = v
            }))
            .method(MethodDecl::getter("isDone", |t: &Task| t.done))
            .method(MethodDecl::setter("setDone", |t: &mut Task, v: bool| t.done = v))
            .method(MethodDecl::getter("getOwnerId", |t: &Task| t.owner_id))
            .method(MethodDecl::setter("setOwnerId", |t: &mut Task, v: i32| {
                t.owner_id = v
            }))
            .method(MethodDecl::ref_getter("getOwner", |t: &Task| t.owner.clone()))
            .method(MethodDecl::ref_setter(
                "setOwner",
                |t: &mut Task, v: Option<Person>| t.owner = v,
            ))
    }
}

/// One column of every semantic type
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    pub id: i64,
    pub tiny: i8,
    pub small: i16,
    pub medium: i32,
    pub ratio: f32,
    pub amount: f64,
    pub flag: bool,
    pub label: String,
    pub note: Option<String>,
    pub at: Option<DateTime<Utc>>,
    pub payload: Option<Vec<u8>>,
}

impl Entity for Sample {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|s: &Sample| s.id, |s, v| s.id = v),
            )
            .field(FieldDecl::column::<i8>("tiny").bind(|s: &Sample| s.tiny, |s, v| s.tiny = v))
            .field(
                FieldDecl::column::<i16>("small").bind(|s: &Sample| s.small, |s, v| s.small = v),
            )
            .field(
                FieldDecl::column::<i32>("medium")
                    .bind(|s: &Sample| s.medium, |s, v| s.medium = v),
            )
            .field(FieldDecl::column::<f32>("ratio").bind(|s: &Sample| s.ratio, |s, v| s.ratio = v))
            .field(
                FieldDecl::column::<f64>("amount")
                    .bind(|s: &Sample| s.amount, |s, v| s.amount = v),
            )
            .field(FieldDecl::column::<bool>("flag").bind(|s: &Sample| s.flag, |s, v| s.flag = v))
            .field(
                FieldDecl::column::<String>("label")
                    .bind(|s: &Sample| s.label.clone(), |s, v| s.label = v),
            )
            .field(
                FieldDecl::column::<Option<String>>("note")
                    .bind(|s: &Sample| s.note.clone(), |s, v| s.note = v),
            )
            .field(
                FieldDecl::column::<Option<DateTime<Utc>>>("at")
                    .bind(|s: &Sample| s.at, |s, v| s.at = v),
            )
            .field(
                FieldDecl::column::<Option<Vec<u8>>>("payload")
                    .bind(|s: &Sample| s.payload.clone(), |s, v| s.payload = v),
            )
    }
}

/// Truncate a timestamp to whole seconds, as storage does
#[allow(dead_code)]
pub fn whole_seconds(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        None
    } else {
        DateTime::<Utc>::from_timestamp(secs, 0)
    }
}
