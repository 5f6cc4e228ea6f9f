use crate::repository::Member;
use quarry::errors::{ErrorKind, QuarryResult};
use quarry::filter::field;
use quarry::query::FieldMutation;
use quarry::session::ModifyingOptions;
use quarry::Quarry;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

fn seed(quarry: &Quarry) -> QuarryResult<Vec<Member>> {
    let members = quarry.repository::<Member>();
    quarry.with_unit_of_work(|uow| {
        members.save_all(
            uow,
            vec![
                Member::new("member1", 10),
                Member::new("member2", 19),
                Member::new("member3", 20),
                Member::new("member4", 21),
                Member::new("member5", 40),
            ],
        )
    })
}

#[test]
fn test_bulk_age_plus() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.begin()?;

            let before = members.find(&uow, field("age").gte(20))?;
            assert_eq!(before.len(), 3);

            let affected = members.bulk_update(
                &uow,
                field("age").gte(20),
                vec![FieldMutation::increment("age", 1)],
                ModifyingOptions::default(),
            )?;
            assert_eq!(affected, 3);

            // managed copies are not touched by the set-based statement
            let stale = members.find(&uow, field("username").eq("member3"))?;
            assert_eq!(stale[0].age, 20);

            let mut refreshed = Vec::new();
            for mut member in before {
                uow.refresh(&mut member)?;
                refreshed.push(member.age);
            }
            assert_eq!(refreshed, vec![21, 22, 41]);

            uow.commit()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_update_with_clear() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.begin()?;

            let loaded = members.find(&uow, field("username").eq("member5"))?;
            assert!(uow.contains(&loaded[0])?);

            let affected = members
                .query(&uow, "update Member m set m.age = m.age + 1 where m.age >= :age")?
                .param("age", 20)
                .execute_update(ModifyingOptions::default().clear_automatically(true))?;
            assert_eq!(affected, 3);
            assert!(!uow.contains(&loaded[0])?);

            let fresh = members.find(&uow, field("username").eq("member5"))?;
            assert_eq!(fresh[0].age, 41);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_update_flushes_staged_writes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.begin()?;

            members.save(&uow, Member::new("member6", 50))?;
            let affected = members.bulk_update(
                &uow,
                field("age").gte(40),
                vec![FieldMutation::set("username", "senior")],
                ModifyingOptions::default(),
            )?;
            assert_eq!(affected, 2);
            uow.commit()?;

            let uow = quarry.unit_of_work()?;
            let seniors = members.find(&uow, field("username").eq("senior"))?;
            assert_eq!(seniors.len(), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_delete() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();

            let deleted = quarry.with_unit_of_work(|uow| {
                members.bulk_delete(uow, field("age").lt(20), ModifyingOptions::default())
            })?;
            assert_eq!(deleted, 2);
            assert_eq!(ctx.store().row_count("member"), 3);

            let deleted = quarry.with_unit_of_work(|uow| {
                members
                    .query(uow, "delete from Member m where m.age > :age")?
                    .param("age", 20)
                    .execute_update(ModifyingOptions::default())
            })?;
            assert_eq!(deleted, 2);
            assert_eq!(ctx.store().row_count("member"), 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_invalid_bulk_updates() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();

            let uow = quarry.unit_of_work()?;
            let err = members
                .bulk_update(
                    &uow,
                    field("age").gte(20),
                    vec![FieldMutation::increment("age", 1)],
                    ModifyingOptions::default(),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::TransactionError);
            drop(uow);

            let uow = quarry.begin()?;
            let err = members
                .bulk_update(
                    &uow,
                    field("age").gte(20),
                    vec![FieldMutation::set("id", 1)],
                    ModifyingOptions::default(),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let err = members
                .bulk_update(&uow, field("age").gte(20), vec![], ModifyingOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let err = members
                .bulk_update(
                    &uow,
                    field("age").gte(20),
                    vec![FieldMutation::set("nickname", "x")],
                    ModifyingOptions::default(),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);

            let err = members
                .bulk_update(
                    &uow,
                    field("username").gte(20),
                    vec![FieldMutation::increment("username", 1)],
                    ModifyingOptions::default(),
                )
                .unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::FilterError | ErrorKind::InvalidOperation));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
