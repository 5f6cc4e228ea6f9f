use crate::repository::{Member, MemberDto, Team};
use quarry::common::{Convertible, Value};
use quarry::errors::{ErrorKind, QuarryResult};
use quarry::mapper::QueryResult;
use quarry::Quarry;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

fn seed(quarry: &Quarry) -> QuarryResult<()> {
    let teams = quarry.repository::<Team>();
    let members = quarry.repository::<Member>();
    quarry.with_unit_of_work(|uow| {
        let team_a = teams.save(uow, Team::new("teamA"))?;
        let team_b = teams.save(uow, Team::new("teamB"))?;
        members.save(uow, Member::with_team("member1", 10, &team_a))?;
        members.save(uow, Member::with_team("member2", 20, &team_a))?;
        members.save(uow, Member::with_team("member3", 30, &team_b))?;
        members.save(uow, Member::new("member4", 40))?;
        Ok(())
    })
}

#[test]
fn test_named_parameters() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let found = members
                .query(&uow, "select m from Member m where m.username = :username and m.age > :age")?
                .param("username", "member2")
                .param("age", 15)
                .list()?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].age, 20);

            let found = members
                .query(&uow, "select m from Member m where m.username in :names order by m.age desc")?
                .param("names", Value::from(vec!["member1", "member3"]))
                .list()?;
            let ages: Vec<i32> = found.iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![30, 10]);

            let found = members
                .query(&uow, "select m from Member m where m.team is null")?
                .list()?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].username, "member4");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_count_query() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let result = members
                .query(&uow, "select count(m) from Member m where m.age >= :age")?
                .param("age", 20)
                .fetch()?;
            assert_eq!(result, QueryResult::Count(3));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_scalar_projection() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let names: Vec<String> = members
                .query(&uow, "select m.username from Member m where m.age < :age order by m.username")?
                .param("age", 25)
                .scalars()?;
            assert_eq!(names, vec!["member1".to_string(), "member2".to_string()]);

            let names: Vec<String> = members
                .query(&uow, "select distinct t.name from Member m join m.team t order by m.age")?
                .scalars()?;
            assert_eq!(names, vec!["teamA".to_string(), "teamB".to_string()]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dto_projection() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let dtos: Vec<MemberDto> = members
                .query(
                    &uow,
                    "select new MemberDto(m.username, t.name) from Member m left join m.team t order by m.username",
                )?
                .project_into()?;
            assert_eq!(dtos.len(), 4);
            assert_eq!(
                dtos[0],
                MemberDto {
                    username: "member1".to_string(),
                    team_name: Some("teamA".to_string()),
                }
            );
            assert_eq!(dtos[3].team_name, None);

            let labels = members
                .query(&uow, "select m.username, m.age from Member m where m.age > :age order by m.age")?
                .param("age", 25)
                .project(|row| {
                    let username = String::from_value(&row.get("username"))?;
                    let age = i32::from_value(&row.get("age"))?;
                    Ok(format!("{}:{}", username, age))
                })?;
            assert_eq!(labels, vec!["member3:30".to_string(), "member4:40".to_string()]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_parameter_binding_errors() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;
            let query = "select m from Member m where m.username = :username";

            let err = members.query(&uow, query)?.list().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ParameterBindingError);

            let err = members
                .query(&uow, query)?
                .param("username", "member1")
                .param("age", 10)
                .list()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ParameterBindingError);

            let err = members
                .query(&uow, "select m from Member m where m.nickname = :name")?
                .param("name", "x")
                .list()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);

            let err = members.query(&uow, "select m from Member m where").err().expect("syntax error");
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unique_result_errors() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;
            let query = "select m from Member m where m.age >= :age";

            let err = members.query(&uow, query)?.param("age", 20).unique().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::AmbiguousResult);

            let err = members.query(&uow, query)?.param("age", 99).unique().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);

            let first = members.query(&uow, query)?.param("age", 20).first()?;
            assert!(first.is_some());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
