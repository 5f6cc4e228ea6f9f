use crate::repository::{Grade, InvoiceLine, Locale, Member, Player, Team};
use quarry::common::{Convertible, Record, Value};
use quarry::entity::{Entity, FetchType, IdStrategy, Reference};
use quarry::errors::ErrorKind;

#[test]
fn test_entity_metadata() {
    let meta = Member::meta();
    assert_eq!(meta.name(), "member");
    assert_eq!(meta.id_field(), "id");
    assert_eq!(meta.id_strategy(), IdStrategy::Generated);
    assert_eq!(meta.fields(), &["id", "username", "age", "team"]);

    let relation = meta.relation("team").expect("team relation");
    assert_eq!(relation.fetch(), FetchType::Lazy);
    assert_eq!(relation.target().name(), "team");

    let relation = Player::meta();
    assert_eq!(relation.relation("club").map(|r| r.fetch()), Some(FetchType::Eager));

    assert!(Team::relations().is_empty());
    assert_eq!(Locale::id_strategy(), IdStrategy::Assigned);
    assert_eq!(Locale::id_field(), "code");
    assert_eq!(InvoiceLine::entity_name(), "invoice_line");
    assert_eq!(InvoiceLine::fields(), &["number", "amount"]);
}

#[test]
fn test_entity_identity() {
    let mut member = Member::new("member1", 10);
    assert_eq!(member.id(), None);
    member.set_id(7);
    assert_eq!(member.id(), Some(7));

    let mut locale = Locale::default();
    locale.set_id("fr".to_string());
    assert_eq!(locale.code.as_deref(), Some("fr"));
}

#[test]
fn test_struct_conversion() {
    let member = Member {
        id: Some(3),
        username: "member1".to_string(),
        age: 10,
        team: Reference::from_key(5i64),
    };
    let value = member.to_value().expect("convertible");
    let record = value.as_record().expect("record");
    assert_eq!(record.get("username"), Value::from("member1"));
    assert_eq!(record.get("team"), Value::from(5i64));
    assert_eq!(Member::from_value(&value).expect("convertible"), member);

    let err = Member::from_value(&Value::from("member1")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ObjectMappingError);
}

#[test]
fn test_ignored_field_defaults() {
    let line = InvoiceLine {
        number: Some(1),
        amount: 2.5,
        draft: "scratch".to_string(),
    };
    let value = line.to_value().expect("convertible");
    assert!(!value.as_record().expect("record").contains_key("draft"));
    let restored = InvoiceLine::from_value(&value).expect("convertible");
    assert_eq!(restored.draft, "");
    assert_eq!(restored.amount, 2.5);
}

#[test]
fn test_enum_conversion() {
    assert_eq!(Grade::Senior.to_value().expect("convertible"), Value::from("Senior"));
    assert_eq!(Grade::from_value(&Value::from("Junior")).expect("convertible"), Grade::Junior);

    let custom = Grade::Custom {
        label: "lead".to_string(),
        level: 3,
    };
    let value = custom.to_value().expect("convertible");
    let record = value.as_record().expect("record");
    assert_eq!(record.get("variant"), Value::from("Custom"));
    assert_eq!(record.get("value.level"), Value::from(3));
    assert_eq!(Grade::from_value(&value).expect("convertible"), custom);

    let scored = Grade::Scored(4.5);
    let value = scored.to_value().expect("convertible");
    assert_eq!(Grade::from_value(&value).expect("convertible"), scored);

    let err = Grade::from_value(&Value::from("Principal")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ObjectMappingError);
    let err = Grade::from_value(&Value::Record(Record::new())).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ObjectMappingError);
}
