use crate::repository::{Member, Player, Team};
use quarry::entity::Reference;
use quarry::errors::ErrorKind;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_lazy_reference_needs_explicit_load() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let teams = quarry.repository::<Team>();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| {
                let team = teams.save(uow, Team::new("teamA"))?;
                members.save(uow, Member::with_team("member1", 10, &team))
            })?;

            let uow = quarry.unit_of_work()?;
            let mut member = members
                .find_by_id(&uow, &saved.id.unwrap_or_default())?
                .expect("saved member");
            assert!(!member.team.is_resolved());
            assert!(member.team.get().is_none());

            let team = member.team.load(&uow)?.cloned();
            assert_eq!(team.map(|t| t.name), Some("teamA".to_string()));
            assert!(member.team.is_resolved());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_fetch_join_resolves_in_one_query() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let teams = quarry.repository::<Team>();
            let members = quarry.repository::<Member>();

            quarry.with_unit_of_work(|uow| {
                let team_a = teams.save(uow, Team::new("teamA"))?;
                let team_b = teams.save(uow, Team::new("teamB"))?;
                members.save(uow, Member::with_team("member1", 10, &team_a))?;
                members.save(uow, Member::with_team("member2", 20, &team_b))?;
                members.save(uow, Member::new("member3", 30))?;
                Ok(())
            })?;

            let uow = quarry.unit_of_work()?;
            let found = members
                .query(&uow, "select m from Member m left join fetch m.team order by m.age")?
                .list()?;
            assert_eq!(found.len(), 3);
            let names: Vec<Option<String>> = found
                .iter()
                .map(|m| m.team.get().map(|t| t.name.clone()))
                .collect();
            assert_eq!(
                names,
                vec![Some("teamA".to_string()), Some("teamB".to_string()), None]
            );
            assert_eq!(found[2].team, Reference::Null);

            let spec = members.query_builder().fetch("team").build()?;
            let found = members.find_with(&uow, &spec)?;
            assert_eq!(found.len(), 2);
            assert!(found.iter().all(|m| m.team.is_resolved()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_eager_relation_is_resolved_on_load() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let teams = quarry.repository::<Team>();
            let players = quarry.repository::<Player>();

            let saved = quarry.with_unit_of_work(|uow| {
                let team = teams.save(uow, Team::new("teamA"))?;
                players.save(
                    uow,
                    Player {
                        id: None,
                        name: "player1".to_string(),
                        club: Reference::to(team),
                    },
                )
            })?;

            let uow = quarry.unit_of_work()?;
            let player = players
                .find_by_id(&uow, &saved.id.unwrap_or_default())?
                .expect("saved player");
            assert_eq!(player.club.get().map(|t| t.name.as_str()), Some("teamA"));

            let all = players.find_all(&uow)?;
            assert!(all[0].club.is_resolved());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dangling_reference_is_not_found() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let saved = quarry.with_unit_of_work(|uow| {
                members.save(
                    uow,
                    Member {
                        team: Reference::from_key(99i64),
                        ..Member::new("member1", 10)
                    },
                )
            })?;

            let uow = quarry.unit_of_work()?;
            let mut member = members
                .find_by_id(&uow, &saved.id.unwrap_or_default())?
                .expect("saved member");
            let err = member.team.load(&uow).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);
            assert!(!member.team.is_resolved());

            let err = members
                .query(&uow, "select m from Member m join fetch m.nope")
                .and_then(|q| q.list())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
