mod bulk_update_test;
mod derive_test;
mod derived_query_test;
mod explicit_query_test;
mod paging_test;
mod relation_test;
mod repository_test;

use quarry::entity::Reference;
use quarry_derive::{Convertible, Entity};
use quarry_int_test::test_util::{random_age, random_username};

#[derive(Debug, Clone, Default, PartialEq, Convertible, Entity)]
#[entity(name = "team", id(field = "id"))]
pub struct Team {
    pub id: Option<i64>,
    pub name: String,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Team {
            id: None,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Convertible, Entity)]
#[entity(name = "member", id(field = "id"), relation(field = "team", fetch = "lazy"))]
pub struct Member {
    pub id: Option<i64>,
    pub username: String,
    pub age: i32,
    pub team: Reference<Team>,
}

impl Member {
    pub fn new(username: &str, age: i32) -> Self {
        Member {
            id: None,
            username: username.to_string(),
            age,
            team: Reference::Null,
        }
    }

    pub fn with_team(username: &str, age: i32, team: &Team) -> Self {
        Member {
            team: Reference::to(team.clone()),
            ..Member::new(username, age)
        }
    }
}

/// Same table layout as [Member] under another name, with the team loaded
/// eagerly.
#[derive(Debug, Clone, Default, PartialEq, Convertible, Entity)]
#[entity(name = "player", relation(field = "club", fetch = "eager"))]
pub struct Player {
    pub id: Option<i64>,
    pub name: String,
    pub club: Reference<Team>,
}

#[derive(Debug, Clone, Default, PartialEq, Convertible, Entity)]
#[entity(name = "locale", id(field = "code", strategy = "assigned"))]
pub struct Locale {
    pub code: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Convertible, Entity)]
#[entity(id(field = "number"))]
#[converter(ignored = "draft")]
pub struct InvoiceLine {
    pub number: Option<i64>,
    pub amount: f64,
    pub draft: String,
}

#[derive(Debug, Clone, Default, PartialEq, Convertible)]
pub struct MemberDto {
    pub username: String,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Convertible)]
pub enum Grade {
    Junior,
    Senior,
    Custom { label: String, level: i32 },
    Scored(f64),
}

pub fn generate_member() -> Member {
    Member::new(&random_username(), random_age())
}

pub fn generate_members(count: usize) -> Vec<Member> {
    (0..count).map(|_| generate_member()).collect()
}
