//! Hand-written entities for unit tests inside the crate, shaped like the
//! output of `#[derive(Convertible, Entity)]`.

use crate::common::{from_value, Convertible, Record, Value};
use crate::entity::{Entity, FetchType, IdStrategy, Reference, Relation};
use crate::errors::QuarryResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Team {
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

impl Convertible for Team {
    fn to_value(&self) -> QuarryResult<Value> {
        let mut record = Record::new();
        record.put("id", self.id.to_value()?);
        record.put("name", self.name.to_value()?);
        Ok(Value::Record(record))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        let record = Record::from_value(value)?;
        Ok(Team {
            id: from_value(&record.get("id"))?,
            name: from_value(&record.get("name"))?,
        })
    }
}

impl Entity for Team {
    type Id = i64;

    fn entity_name() -> &'static str {
        "team"
    }

    fn id_field() -> &'static str {
        "id"
    }

    fn fields() -> &'static [&'static str] {
        &["id", "name"]
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Member {
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

    pub fn with_team(username: &str, age: i32, team: Team) -> Self {
        Member {
            team: Reference::to(team),
            ..Member::new(username, age)
        }
    }
}

impl Convertible for Member {
    fn to_value(&self) -> QuarryResult<Value> {
        let mut record = Record::new();
        record.put("id", self.id.to_value()?);
        record.put("username", self.username.to_value()?);
        record.put("age", self.age.to_value()?);
        record.put("team", self.team.to_value()?);
        Ok(Value::Record(record))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        let record = Record::from_value(value)?;
        Ok(Member {
            id: from_value(&record.get("id"))?,
            username: from_value(&record.get("username"))?,
            age: from_value(&record.get("age"))?,
            team: from_value(&record.get("team"))?,
        })
    }
}

impl Entity for Member {
    type Id = i64;

    fn entity_name() -> &'static str {
        "member"
    }

    fn id_field() -> &'static str {
        "id"
    }

    fn fields() -> &'static [&'static str] {
        &["id", "username", "age", "team"]
    }

    fn relations() -> Vec<Relation> {
        vec![Relation::new("team", <Team as Entity>::meta, FetchType::Lazy)]
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// An entity with a caller-assigned string identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Code {
    pub code: String,
    pub label: String,
}

impl Convertible for Code {
    fn to_value(&self) -> QuarryResult<Value> {
        let mut record = Record::new();
        record.put("code", self.code.to_value()?);
        record.put("label", self.label.to_value()?);
        Ok(Value::Record(record))
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        let record = Record::from_value(value)?;
        Ok(Code {
            code: from_value(&record.get("code"))?,
            label: from_value(&record.get("label"))?,
        })
    }
}

impl Entity for Code {
    type Id = String;

    fn entity_name() -> &'static str {
        "code"
    }

    fn id_field() -> &'static str {
        "code"
    }

    fn id_strategy() -> IdStrategy {
        IdStrategy::Assigned
    }

    fn fields() -> &'static [&'static str] {
        &["code", "label"]
    }

    fn id(&self) -> Option<String> {
        if self.code.is_empty() {
            None
        } else {
            Some(self.code.clone())
        }
    }

    fn set_id(&mut self, id: String) {
        self.code = id;
    }
}
