use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::Future;
use futures::FutureExt;
use tracing::error;

use crate::{AppError, AppResult};

pub const PANIC_CODE: &str = "RUNTIME/PANIC";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn app_error_from_panic(payload: Box<dyn Any + Send>) -> AppError {
    let error = AppError::new(PANIC_CODE, panic_message(payload.as_ref()));
    error!(
        target: "daybook",
        event = "panic_caught",
        code = %error.code(),
        message = %error.message()
    );
    error
}

#[allow(clippy::result_large_err)]
pub fn dispatch_with_fence<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Ok(result),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

/// Runs a side-effect future, turning a panic in either its construction or
/// its polling into a `RUNTIME/PANIC` error.
#[allow(clippy::result_large_err)]
pub async fn dispatch_async_with_fence<F, Fut, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let fut = dispatch_with_fence(|| AssertUnwindSafe(f()).catch_unwind())?;
    match fut.await {
        Ok(value) => Ok(value),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

#[allow(clippy::result_large_err)]
pub async fn dispatch_async_app_result<F, Fut, T>(f: F) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    dispatch_async_with_fence(f).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::panic_any;

    #[test]
    fn dispatch_with_fence_passes_through() {
        let value = dispatch_with_fence(|| 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn dispatch_with_fence_catches_str_panic() {
        let err = dispatch_with_fence(|| panic!("boom"))
            .err()
            .expect("should convert panic into error");
        assert_eq!(err.code(), PANIC_CODE);
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn dispatch_with_fence_catches_non_string_panic() {
        let err = dispatch_with_fence(|| panic_any(123_i32))
            .err()
            .expect("should convert panic into error");
        assert_eq!(err.message(), "unknown panic payload");
    }

    #[tokio::test]
    async fn async_fence_catches_panic_while_polling() {
        let err = dispatch_async_app_result(|| async {
            tokio::task::yield_now().await;
            if true {
                panic!("late boom");
            }
            Ok::<_, AppError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), PANIC_CODE);
        assert_eq!(err.message(), "late boom");
    }

    #[tokio::test]
    async fn async_fence_passes_errors_through() {
        let err = dispatch_async_app_result(|| async {
            Err::<(), _>(AppError::new("CALENDAR/DOWN", "offline"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), "CALENDAR/DOWN");
    }
}
