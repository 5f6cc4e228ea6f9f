use crate::repository::{generate_members, InvoiceLine, Locale, Member};
use quarry::common::{Order, Sort, SortOrder};
use quarry::entity::EntityState;
use quarry::errors::ErrorKind;
use quarry::filter::field;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_save_and_find_by_id() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| members.save(uow, Member::new("member1", 10)))?;
            let id = saved.id.expect("generated identity");

            let uow = quarry.unit_of_work()?;
            let found = members.find_by_id(&uow, &id)?;
            assert_eq!(found, Some(saved));
            assert!(members.exists_by_id(&uow, &id)?);
            assert_eq!(members.find_by_id(&uow, &(id + 100))?, None);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_save_updates_managed_entity() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| members.save(uow, Member::new("member1", 10)))?;
            let id = saved.id.expect("generated identity");

            quarry.with_unit_of_work(|uow| {
                let mut member = members.find_by_id(uow, &id)?.expect("saved member");
                member.age = 11;
                members.save(uow, member)?;
                Ok(())
            })?;

            let uow = quarry.unit_of_work()?;
            assert_eq!(members.find_by_id(&uow, &id)?.map(|m| m.age), Some(11));
            assert_eq!(members.count(&uow)?, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_all_sorted_and_by_ids() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| members.save_all(uow, generate_members(5)))?;
            let uow = quarry.unit_of_work()?;

            let sorted = members.find_all_sorted(&uow, Sort::by(SortOrder::Descending, &["age"]))?;
            assert_eq!(sorted.len(), 5);
            assert!(sorted.windows(2).all(|pair| pair[0].age >= pair[1].age));

            let sorted = members.find_all_sorted(
                &uow,
                Sort::from_orders(vec![Order::asc("username"), Order::desc("id")]),
            )?;
            assert!(sorted.windows(2).all(|pair| pair[0].username <= pair[1].username));

            let ids = vec![saved[0].id.unwrap_or_default(), saved[3].id.unwrap_or_default(), 999];
            let by_ids = members.find_all_by_ids(&uow, &ids)?;
            assert_eq!(by_ids.len(), 2);

            let err = members
                .find_all_sorted(&uow, Sort::by(SortOrder::Ascending, &["nickname"]))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_with_filter() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            quarry.with_unit_of_work(|uow| {
                members.save_all(
                    uow,
                    vec![
                        Member::new("aaa", 10),
                        Member::new("bbb", 20),
                        Member::new("ccc", 30),
                    ],
                )
            })?;

            let uow = quarry.unit_of_work()?;
            let found = members.find(&uow, field("age").gte(20).and(field("username").ne("ccc")))?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].username, "bbb");

            let found = members.find(&uow, field("username").in_list(vec!["aaa", "ccc"]))?;
            assert_eq!(found.len(), 2);

            let err = members.find(&uow, field("nickname").eq("aaa")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_delete_operations() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| members.save_all(uow, generate_members(4)))?;
            let first = saved[0].clone();
            let second_id = saved[1].id.unwrap_or_default();

            quarry.with_unit_of_work(|uow| {
                members.delete(uow, &first)?;
                assert!(members.delete_by_id(uow, &second_id)?);
                assert!(!members.delete_by_id(uow, &999)?);
                assert_eq!(members.count(uow)?, 2);
                Ok(())
            })?;

            let uow = quarry.unit_of_work()?;
            assert_eq!(members.count(&uow)?, 2);
            assert_eq!(ctx.store().row_count("member"), 2);
            drop(uow);

            let deleted = quarry.with_unit_of_work(|uow| members.delete_all(uow))?;
            assert_eq!(deleted, 2);
            assert_eq!(ctx.store().row_count("member"), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_assigned_identity() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let locales = quarry.repository::<Locale>();

            quarry.with_unit_of_work(|uow| {
                locales.save(
                    uow,
                    Locale {
                        code: Some("en".to_string()),
                        label: "English".to_string(),
                    },
                )
            })?;

            let uow = quarry.begin()?;
            let found = locales.find_by_id(&uow, &"en".to_string())?;
            assert_eq!(found.map(|l| l.label), Some("English".to_string()));

            let err = locales.save(&uow, Locale::default()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotIdentifiable);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_ignored_field_is_not_stored() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let lines = quarry.repository::<InvoiceLine>();

            let saved = quarry.with_unit_of_work(|uow| {
                lines.save(
                    uow,
                    InvoiceLine {
                        number: None,
                        amount: 12.5,
                        draft: "scratch".to_string(),
                    },
                )
            })?;
            let number = saved.number.expect("generated identity");

            let row = ctx
                .store()
                .committed("invoice_line", &number.into())
                .expect("committed row");
            assert!(!row.contains_key("draft"));

            let uow = quarry.unit_of_work()?;
            let found = lines.find_by_id(&uow, &number)?.expect("saved line");
            assert_eq!(found.amount, 12.5);
            assert_eq!(found.draft, "");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_entity_states() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let uow = quarry.begin()?;

            let transient = Member::new("member1", 10);
            assert_eq!(uow.state_of(&transient)?, EntityState::Transient);

            let saved = members.save(&uow, transient)?;
            assert_eq!(uow.state_of(&saved)?, EntityState::Persistent);
            assert!(uow.contains(&saved)?);

            uow.detach(&saved)?;
            assert_eq!(uow.state_of(&saved)?, EntityState::Detached);

            let managed = members.save(&uow, saved)?;
            members.delete(&uow, &managed)?;
            assert_eq!(uow.state_of(&managed)?, EntityState::Removed);

            let err = members.save(&uow, managed.clone()).err().expect("removed entity");
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert_eq!(uow.state_of(&managed)?, EntityState::Removed);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
