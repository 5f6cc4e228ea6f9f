use crate::repository::{Member, Team};
use quarry::common::Value;
use quarry::errors::{ErrorKind, QuarryResult};
use quarry::mapper::{QueryResult, ResultShape};
use quarry::paging::PageRequest;
use quarry::session::ModifyingOptions;
use quarry::Quarry;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

fn seed(quarry: &Quarry) -> QuarryResult<()> {
    let teams = quarry.repository::<Team>();
    let members = quarry.repository::<Member>();
    quarry.with_unit_of_work(|uow| {
        let team_a = teams.save(uow, Team::new("teamA"))?;
        members.save(uow, Member::with_team("aaa", 10, &team_a))?;
        members.save(uow, Member::with_team("aaa", 20, &team_a))?;
        members.save(uow, Member::new("bbb", 30))?;
        members.save(uow, Member::new("ccc", 40))?;
        Ok(())
    })
}

#[test]
fn test_find_by_username_and_age_greater_than() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let found = members
                .derived(&uow, "find_by_username_and_age_greater_than")?
                .arg("aaa")
                .arg(15)
                .list()?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].username, "aaa");
            assert_eq!(found[0].age, 20);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_derived_operators_and_ordering() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let found = members
                .derived(&uow, "find_by_age_between_order_by_age_desc")?
                .arg(15)
                .arg(35)
                .list()?;
            let ages: Vec<i32> = found.iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![30, 20]);

            let found = members
                .derived(&uow, "find_by_username_in")?
                .arg(Value::from(vec!["bbb", "ccc"]))
                .list()?;
            assert_eq!(found.len(), 2);

            let found = members
                .derived(&uow, "find_by_username_or_age_less_than")?
                .arg("ccc")
                .arg(15)
                .list()?;
            assert_eq!(found.len(), 2);

            let first = members
                .derived(&uow, "find_first_by_username_order_by_age_desc")?
                .arg("aaa")
                .first()?;
            assert_eq!(first.map(|m| m.age), Some(20));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_derived_result_shapes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let count = members.derived(&uow, "count_by_username")?.arg("aaa");
            assert_eq!(count.natural_shape()?, ResultShape::Count);
            assert_eq!(count.fetch()?, QueryResult::Count(2));

            let exists = members.derived(&uow, "exists_by_age")?.arg(40).exists()?;
            assert!(exists);
            let exists = members.derived(&uow, "exists_by_age")?.arg(41).exists()?;
            assert!(!exists);

            let page = members
                .derived(&uow, "find_by_age_greater_than")?
                .arg(5)
                .page(&PageRequest::of(1, 3)?)?;
            assert_eq!(page.total_elements(), 4);
            assert_eq!(page.number_of_elements(), 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_derived_delete() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();

            let deleted = quarry.with_unit_of_work(|uow| {
                members
                    .derived(uow, "delete_by_username")?
                    .arg("aaa")
                    .execute_update(ModifyingOptions::default())
            })?;
            assert_eq!(deleted, 2);
            assert_eq!(ctx.store().row_count("member"), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_invalid_derived_names() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            for name in ["find_by_nickname", "find_by_username_and", "fetch_by_username"] {
                let err = members.derived(&uow, name).err().expect("derivation error");
                assert_eq!(err.kind(), &ErrorKind::QueryDerivationError, "{}", name);
            }

            let err = members
                .derived(&uow, "find_by_username")?
                .arg("aaa")
                .arg("bbb")
                .list()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ParameterBindingError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
