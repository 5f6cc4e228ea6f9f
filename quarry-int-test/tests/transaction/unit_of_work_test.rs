use crate::repository::{generate_members, Member};
use quarry::common::{Sort, SortOrder};
use quarry::errors::{ErrorKind, QuarryError};
use quarry::filter::field;
use quarry::Quarry;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};
use std::collections::HashSet;

#[test]
fn test_commit_and_rollback() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let uow = quarry.begin()?;
            members.save(&uow, Member::new("committed", 10))?;
            uow.commit()?;
            assert!(uow.is_closed());

            let uow = quarry.begin()?;
            members.save(&uow, Member::new("rolled_back", 20))?;
            uow.flush()?;
            uow.rollback()?;

            let uow = quarry.begin()?;
            members.save(&uow, Member::new("dropped", 30))?;
            uow.flush()?;
            drop(uow);

            let uow = quarry.unit_of_work()?;
            let all = members.find_all(&uow)?;
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].username, "committed");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_with_unit_of_work_rolls_back_on_error() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let result: Result<(), QuarryError> = quarry.with_unit_of_work(|uow| {
                members.save_all(uow, generate_members(3))?;
                uow.flush()?;
                members.find(uow, field("nickname").eq("x"))?;
                Ok(())
            });
            assert_eq!(result.unwrap_err().kind(), &ErrorKind::QueryDerivationError);
            assert_eq!(ctx.store().row_count("member"), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_uncommitted_writes_are_isolated() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let writer = quarry.begin()?;
            members.save(&writer, Member::new("member1", 10))?;
            writer.flush()?;
            assert_eq!(members.count(&writer)?, 1);

            let reader = quarry.unit_of_work()?;
            assert_eq!(members.count(&reader)?, 0);

            writer.commit()?;
            let reader = quarry.unit_of_work()?;
            assert_eq!(members.count(&reader)?, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_staged_writes_visible_without_auto_flush() {
    run_test(
        || {
            let ctx = create_test_context()?;
            let quarry = Quarry::builder()
                .store(ctx.store())
                .flush_before_query(false)
                .open()?;
            Ok(TestContext::new(quarry, ctx.store()))
        },
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let uow = quarry.begin()?;

            members.save(&uow, Member::new("member1", 10))?;
            members.save(&uow, Member::new("member2", 20))?;

            let found = members.find(&uow, field("age").gt(15))?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].username, "member2");
            assert_eq!(members.count(&uow)?, 2);

            uow.commit()?;
            assert_eq!(ctx.store().row_count("member"), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_staged_update_moves_entity_between_results() {
    run_test(
        || {
            let ctx = create_test_context()?;
            let quarry = Quarry::builder()
                .store(ctx.store())
                .flush_before_query(false)
                .open()?;
            Ok(TestContext::new(quarry, ctx.store()))
        },
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let first = quarry.with_unit_of_work(|uow| {
                let first = members.save(uow, Member::new("member1", 10))?;
                members.save(uow, Member::new("member2", 15))?;
                Ok(first)
            })?;

            let uow = quarry.begin()?;
            let mut member = members
                .find_by_id(&uow, &first.id.unwrap_or_default())?
                .expect("saved member");
            member.age = 30;
            members.save(&uow, member)?;

            let young = members.find(&uow, field("age").lt(20))?;
            let names: Vec<&str> = young.iter().map(|m| m.username.as_str()).collect();
            assert_eq!(names, vec!["member2"]);
            let count = members.derived(&uow, "count_by_age_less_than")?.arg(20).count()?;
            assert_eq!(count, 1);

            let sorted = members.find_all_sorted(&uow, Sort::by(SortOrder::Ascending, &["age"]))?;
            let ages: Vec<i32> = sorted.iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![15, 30]);

            uow.rollback()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_identity_map_returns_managed_state() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let saved = quarry.with_unit_of_work(|uow| members.save(uow, Member::new("member1", 10)))?;
            let id = saved.id.unwrap_or_default();

            let uow = quarry.begin()?;
            let mut member = members.find_by_id(&uow, &id)?.expect("saved member");
            member.age = 99;
            members.save(&uow, member)?;

            // every read in this unit of work sees the managed copy
            let by_id = members.find_by_id(&uow, &id)?.expect("managed member");
            assert_eq!(by_id.age, 99);
            let by_query = members.find(&uow, field("username").eq("member1"))?;
            assert_eq!(by_query[0].age, 99);

            // the change was flushed into the transaction by the queries above
            uow.clear()?;
            assert!(!uow.contains(&by_id)?);
            let reloaded = members.find_by_id(&uow, &id)?.expect("stored member");
            assert_eq!(reloaded.age, 99);
            uow.rollback()?;

            let uow = quarry.unit_of_work()?;
            let original = members.find_by_id(&uow, &id)?.expect("stored member");
            assert_eq!(original.age, 10);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closed_unit_of_work_rejects_work() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let uow = quarry.unit_of_work()?;
            let err = uow.commit().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::TransactionError);

            let uow = quarry.begin()?;
            uow.commit()?;
            let err = members.save(&uow, Member::new("late", 1)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            let err = uow.begin().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_concurrent_units_of_work() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();

            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        let quarry = quarry.clone();
                        scope.spawn(move || {
                            let members = quarry.repository::<Member>();
                            quarry.with_unit_of_work(|uow| members.save_all(uow, generate_members(25)))
                        })
                    })
                    .collect();
                for handle in handles {
                    let saved = handle.join().expect("writer thread")?;
                    assert_eq!(saved.len(), 25);
                }
                Ok::<(), QuarryError>(())
            })?;

            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;
            let all = members.find_all(&uow)?;
            assert_eq!(all.len(), 100);
            let ids: HashSet<i64> = all.iter().filter_map(|m| m.id).collect();
            assert_eq!(ids.len(), 100);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
