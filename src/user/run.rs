use tracing::{debug, warn};

use crate::error::{BehaviorError, TaskError};

use super::{UserContext, VirtualUser};

/// Ends a nested scope on `Interrupt`; everything else passes through.
///
/// # Errors
///
/// Returns the original error unless it was an interrupt.
pub fn catch_interrupt(result: Result<(), TaskError>) -> Result<(), TaskError> {
    match result {
        Err(TaskError::Interrupt) => Ok(()),
        Ok(()) | Err(TaskError::Failure(_) | TaskError::Stop) => result,
    }
}

/// Drives one virtual user until it stops, is cancelled, or fails fatally.
///
/// Failures are recorded in the exception store; the user keeps going when
/// `ctx` catches failures. An interrupt that reaches this loop had no
/// enclosing scope and is never recorded.
///
/// # Errors
///
/// Returns `Failure` when catching is disabled and `UncaughtInterrupt` for
/// an interrupt at the top level.
pub async fn run_user(
    mut user: Box<dyn VirtualUser>,
    ctx: UserContext,
) -> Result<(), BehaviorError> {
    loop {
        match user.step(&ctx).await {
            Ok(()) => {}
            Err(TaskError::Failure(failure)) => {
                ctx.exceptions().record(&failure, None);
                if !ctx.catch_failures() {
                    return Err(BehaviorError::Failure {
                        spec: ctx.spec().to_owned(),
                        failure,
                    });
                }
                warn!("User '{}' failed: {}", ctx.spec(), failure);
            }
            Err(TaskError::Interrupt) => {
                return Err(BehaviorError::UncaughtInterrupt {
                    spec: ctx.spec().to_owned(),
                });
            }
            Err(TaskError::Stop) => {
                debug!("User '{}' stopped itself", ctx.spec());
                return Ok(());
            }
        }
        let wait = user.wait_time();
        if wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, AppResult, TaskFailure};
    use crate::exceptions::ExceptionsHandle;
    use crate::stats::StatsHandle;

    enum Action {
        Fail,
        Interrupt,
        NestedInterrupt,
        Stop,
    }

    struct Scripted {
        actions: VecDeque<Action>,
    }

    impl Scripted {
        fn boxed(actions: Vec<Action>) -> Box<dyn VirtualUser> {
            Box::new(Self {
                actions: actions.into(),
            })
        }
    }

    #[async_trait]
    impl VirtualUser for Scripted {
        async fn step(&mut self, _ctx: &UserContext) -> Result<(), TaskError> {
            match self.actions.pop_front() {
                Some(Action::Fail) => Err(TaskFailure::new("HeyAnException", ":(").into()),
                Some(Action::Interrupt) => Err(TaskError::Interrupt),
                Some(Action::NestedInterrupt) => catch_interrupt(Err(TaskError::Interrupt)),
                Some(Action::Stop) | None => Err(TaskError::Stop),
            }
        }
    }

    fn context() -> UserContext {
        UserContext::new("scripted", StatsHandle::new(), ExceptionsHandle::new())
    }

    fn only_count(ctx: &UserContext) -> AppResult<u64> {
        let reports = ctx.exceptions().serialize();
        if reports.len() != 1 {
            return Err(AppError::behavior(format!(
                "expected one exception record, got {}",
                reports.len()
            )));
        }
        reports
            .first()
            .map(|report| report.count)
            .ok_or_else(|| AppError::behavior("missing exception record"))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_is_recorded_and_execution_continues() -> AppResult<()> {
        let ctx = context();
        let user = Scripted::boxed(vec![Action::Fail, Action::Fail, Action::Stop]);
        run_user(user, ctx.clone()).await?;
        if only_count(&ctx)? != 2 {
            return Err(AppError::behavior("expected count == 2"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_catching_surfaces_failure_and_still_records() -> AppResult<()> {
        let ctx = context().with_catch_failures(false);
        for _ in 0..2 {
            let user = Scripted::boxed(vec![Action::Fail, Action::Stop]);
            match run_user(user, ctx.clone()).await {
                Err(BehaviorError::Failure { failure, .. }) if failure.class == "HeyAnException" => {}
                other => {
                    return Err(AppError::behavior(format!(
                        "expected failure, got {:?}",
                        other
                    )));
                }
            }
        }
        if only_count(&ctx)? != 2 {
            return Err(AppError::behavior("expected count == 2"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn top_level_interrupt_is_fatal_and_not_recorded() -> AppResult<()> {
        let ctx = context();
        let user = Scripted::boxed(vec![Action::Fail, Action::Interrupt]);
        match run_user(user, ctx.clone()).await {
            Err(BehaviorError::UncaughtInterrupt { spec }) if spec == "scripted" => {}
            other => {
                return Err(AppError::behavior(format!(
                    "expected uncaught interrupt, got {:?}",
                    other
                )));
            }
        }
        if only_count(&ctx)? != 1 {
            return Err(AppError::behavior("only the failure should be recorded"));
        }
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn nested_interrupt_is_caught_by_scope() -> AppResult<()> {
        let ctx = context();
        let user = Scripted::boxed(vec![Action::NestedInterrupt, Action::Stop]);
        run_user(user, ctx.clone()).await?;
        if !ctx.exceptions().serialize().is_empty() {
            return Err(AppError::behavior("interrupts are never recorded"));
        }
        Ok(())
    }
}
