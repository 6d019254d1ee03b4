//! 截止时间重试包装器的行为测试
//!
//! 用真实的极短时长驱动，不使用暂停时钟：包装器在失败后立即重试，
//! 暂停时钟会让"截止时间"永远不到。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use campaign_job_submit::error::{AppError, AppResult, ConsoleError};
use campaign_job_submit::infrastructure::retry;

#[tokio::test]
async fn succeeds_after_transient_failures() {
    let calls = AtomicUsize::new(0);

    let result: AppResult<u32> =
        retry::until_deadline(Duration::from_secs(5), "偶发失败的动作", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(AppError::Other(format!("第 {} 次失败", n + 1)))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    assert_eq!(result.expect("应该在第 4 次成功"), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn gives_up_with_action_timeout_at_deadline() {
    let started = Instant::now();

    let result: AppResult<()> =
        retry::until_deadline(Duration::from_millis(50), "永不成功的动作", || async {
            Err(AppError::Other("总是失败".to_string()))
        })
        .await;

    let err = result.expect_err("应该超时");
    match &err {
        AppError::Console(ConsoleError::ActionTimeout {
            action, attempts, ..
        }) => {
            assert_eq!(action, "永不成功的动作");
            assert!(*attempts >= 1, "至少尝试过一次");
        }
        other => panic!("错误应该是操作超时，实际是: {}", other),
    }
    assert!(err.is_action_timeout());
    // 截止后立即放弃，不会长时间空转
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn first_success_returns_immediately() {
    let result: AppResult<&str> = tokio_test::block_on(retry::until_deadline(
        Duration::from_millis(10),
        "一次就成的动作",
        || async { Ok("完成") },
    ));
    assert_eq!(result.expect("应该直接成功"), "完成");
}
