use crate::repository::Member;
use quarry::errors::ErrorKind;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_store_failures_propagate_unchanged() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            quarry.with_unit_of_work(|uow| members.save(uow, Member::new("member1", 10)))?;

            for kind in [ErrorKind::StoreUnavailable, ErrorKind::OperationTimeout] {
                let uow = quarry.unit_of_work()?;
                ctx.store().inject_fault(Some(kind.clone()));
                let err = members.find_all(&uow).unwrap_err();
                assert_eq!(err.kind(), &kind);
                let err = members.count(&uow).unwrap_err();
                assert_eq!(err.kind(), &kind);
                ctx.store().inject_fault(None);
            }

            let uow = quarry.unit_of_work()?;
            assert_eq!(members.count(&uow)?, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_failed_commit_leaves_store_untouched() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();

            let uow = quarry.begin()?;
            members.save(&uow, Member::new("member1", 10))?;
            ctx.store().inject_fault(Some(ErrorKind::OperationTimeout));
            let err = uow.commit().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::OperationTimeout);
            ctx.store().inject_fault(None);
            drop(uow);

            assert_eq!(ctx.store().row_count("member"), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closed_quarry_is_unavailable() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            quarry.close()?;
            let err = quarry.unit_of_work().err().expect("closed quarry");
            assert_eq!(err.kind(), &ErrorKind::StoreUnavailable);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
