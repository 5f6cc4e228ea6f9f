use crate::repository::Member;
use quarry::common::{Sort, SortOrder};
use quarry::errors::{ErrorKind, QuarryResult};
use quarry::filter::field;
use quarry::paging::PageRequest;
use quarry::Quarry;
use quarry_int_test::test_util::{cleanup, create_test_context, run_test};

fn seed(quarry: &Quarry, count: i32) -> QuarryResult<()> {
    let members = quarry.repository::<Member>();
    quarry.with_unit_of_work(|uow| {
        for i in 1..=count {
            members.save(uow, Member::new(&format!("member{}", i), i * 10))?;
        }
        Ok(())
    })
}

#[test]
fn test_page_of_sorted_members() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry, 6)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let request = PageRequest::of_sorted(0, 3, Sort::by(SortOrder::Descending, &["age"]))?;
            let page = members.find_all_paged(&uow, &request)?;
            assert_eq!(page.total_elements(), 6);
            assert_eq!(page.total_pages(), 2);
            assert_eq!(page.number(), 0);
            assert!(page.is_first());
            assert!(page.has_next());
            let ages: Vec<i32> = page.content().iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![60, 50, 40]);

            let next = page.next_request().expect("second page");
            let page = members.find_all_paged(&uow, &next)?;
            assert!(page.is_last());
            assert!(!page.has_next());
            let ages: Vec<i32> = page.content().iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![30, 20, 10]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_page_past_the_end() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry, 4)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let page = members.find_all_paged(&uow, &PageRequest::of(5, 2)?)?;
            assert!(!page.has_content());
            assert_eq!(page.total_elements(), 4);
            assert_eq!(page.total_pages(), 2);

            let request = PageRequest::try_of(i64::MAX, 2)?;
            let page = members.find_all_paged(&uow, &request)?;
            assert!(!page.has_content());
            assert!(page.is_last());
            assert_eq!(page.total_elements(), 4);

            let page = members.find_all_paged(&uow, &PageRequest::of(u64::MAX, 2)?)?;
            assert!(!page.has_next());
            assert!(page.next_request().is_none());

            let spec = members.query_builder().build()?;
            let slice = members.slice(&uow, &spec, &PageRequest::of(u64::MAX, 2)?)?;
            assert!(slice.content().is_empty());
            assert!(!slice.has_next());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_page_of_filtered_query() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry, 10)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let spec = members.query_builder().filter(field("age").gt(25)).build()?;
            let page = members.page(&uow, &spec, &PageRequest::of(1, 3)?)?;
            assert_eq!(page.total_elements(), 8);
            assert_eq!(page.total_pages(), 3);
            let ages: Vec<i32> = page.content().iter().map(|m| m.age).collect();
            assert_eq!(ages, vec![60, 70, 80]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_slice_does_not_count() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry, 5)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;
            let spec = members.query_builder().build()?;

            let slice = members.slice(&uow, &spec, &PageRequest::of(0, 2)?)?;
            assert_eq!(slice.number_of_elements(), 2);
            assert!(slice.has_next());

            let slice = members.slice(&uow, &spec, &PageRequest::of(2, 2)?)?;
            assert_eq!(slice.number_of_elements(), 1);
            assert!(!slice.has_next());
            assert!(slice.has_previous());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_invalid_page_requests() {
    run_test(
        || create_test_context(),
        |ctx| {
            let quarry = ctx.quarry();
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let err = PageRequest::of(0, 0).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidPageRequest);
            let err = PageRequest::try_of(-1, 10).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidPageRequest);

            let request = PageRequest::of_sorted(0, 10, Sort::by(SortOrder::Ascending, &["nickname"]))?;
            let err = members.find_all_paged(&uow, &request).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::QueryDerivationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_page_size_is_capped() {
    run_test(
        || {
            let ctx = create_test_context()?;
            let quarry = Quarry::builder().store(ctx.store()).max_page_size(2).open()?;
            Ok(quarry_int_test::test_util::TestContext::new(quarry, ctx.store()))
        },
        |ctx| {
            let quarry = ctx.quarry();
            seed(&quarry, 5)?;
            let members = quarry.repository::<Member>();
            let uow = quarry.unit_of_work()?;

            let page = members.find_all_paged(&uow, &PageRequest::of(0, 100)?)?;
            assert_eq!(page.size(), 2);
            assert_eq!(page.number_of_elements(), 2);
            assert_eq!(page.total_pages(), 3);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
