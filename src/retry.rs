use log::debug;

use crate::error::Result;

/// Runs `op`, and runs it exactly once more if it failed with a recoverable
/// connection error. The second result is returned as is.
///
/// By the time a recoverable error surfaces the pool has already forgotten the
/// lost index, so the second run reopens it on another connection.
pub fn retry_on_failure<T, F>(mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    match op() {
        Err(e) if e.is_recoverable() => {
            debug!("retrying after recoverable error: {e}");
            op()
        }
        res => res,
    }
}

#[cfg(test)]
mod tests {
    use crate::error::HsError;

    use super::*;

    #[test]
    fn retries_recoverable_once() {
        let mut calls = 0;
        let res = retry_on_failure(|| {
            calls += 1;
            if calls == 1 {
                Err(HsError::RecoverableConnection("closed".into()))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(res, Ok(2));
    }

    #[test]
    fn second_failure_propagates() {
        let mut calls = 0;
        let res: Result<()> = retry_on_failure(|| {
            calls += 1;
            Err(HsError::RecoverableConnection(format!("attempt {calls}")))
        });

        assert_eq!(res, Err(HsError::RecoverableConnection("attempt 2".into())));
        assert_eq!(calls, 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let inputs = vec![
            HsError::Connection("down".into()),
            HsError::Operational("rejected".into()),
            HsError::Validation("bad".into()),
        ];

        for err in inputs {
            let mut calls = 0;
            let res: Result<()> = retry_on_failure(|| {
                calls += 1;
                Err(err.clone())
            });

            assert_eq!(res, Err(err));
            assert_eq!(calls, 1);
        }
    }
}
