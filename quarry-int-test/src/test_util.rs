use fake::faker::name::en::FirstName;
use fake::Fake;
use quarry::errors::QuarryResult;
use quarry::store::memory::{InMemoryStore, InMemoryStoreConfig};
use quarry::Quarry;
use rand::{rng, Rng};
use std::backtrace::Backtrace;
use std::time::Instant;

/// Runs `test` between `before` and `after`, reporting errors and panics
/// with a backtrace. `after` runs even when the test fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> QuarryResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> QuarryResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> QuarryResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed: {}", error);
}

/// A quarry over its own in-memory store. The store handle is kept so tests
/// can inspect committed rows and inject faults.
#[derive(Clone)]
pub struct TestContext {
    quarry: Quarry,
    store: InMemoryStore,
}

impl TestContext {
    pub fn new(quarry: Quarry, store: InMemoryStore) -> Self {
        Self { quarry, store }
    }

    pub fn quarry(&self) -> Quarry {
        self.quarry.clone()
    }

    pub fn store(&self) -> InMemoryStore {
        self.store.clone()
    }
}

pub fn create_test_context() -> QuarryResult<TestContext> {
    create_test_context_with(InMemoryStoreConfig::new())
}

pub fn create_test_context_with(config: InMemoryStoreConfig) -> QuarryResult<TestContext> {
    let store = InMemoryStore::new(config);
    let quarry = Quarry::builder().store(store.clone()).open()?;
    Ok(TestContext::new(quarry, store))
}

pub fn cleanup(ctx: TestContext) -> QuarryResult<()> {
    ctx.store().inject_fault(None);
    ctx.quarry().close()
}

pub fn random_username() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", FirstName().fake::<String>().to_lowercase(), &suffix[..8])
}

pub fn random_age() -> i32 {
    rng().random_range(18..65)
}
